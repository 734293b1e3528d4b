//! Shared fixtures for integration tests.

#![allow(dead_code)]

pub mod app;

use sonda::memory::{MemoryDriver, MemoryLauncher};
use sonda::{HarnessConfig, WaitOptions};

pub use app::{AppOptions, AtlasApp};

/// Tight timing that still leaves room for the app's render latency
pub fn test_config() -> HarnessConfig {
    HarnessConfig::default().with_wait(
        WaitOptions::new()
            .with_timeout(2_000)
            .with_poll_interval(50),
    )
}

/// Launcher handing out a fresh page of `app` per session
pub fn launcher(app: &AtlasApp) -> MemoryLauncher {
    let app = app.clone();
    MemoryLauncher::new(move || app.driver())
}

/// Launcher whose drivers re-render the next `count` click targets just before dispatch
pub fn flaky_launcher(app: &AtlasApp, count: u32) -> MemoryLauncher {
    let app = app.clone();
    MemoryLauncher::new(move || {
        let driver: MemoryDriver = app.driver();
        let _ = driver.rerender_before_clicks(count);
        driver
    })
}
