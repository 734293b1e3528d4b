//! Action primitives and the scoped session.
//!
//! A [`Session`] wraps one driver and guards every action with a wait:
//! clicks and typing wait for `clickable`, clearing waits for `present`,
//! dialog resolution waits for `dialog-present`.
//!
//! [`run_scoped`] owns the session lifecycle: launch, run a [`SessionTask`],
//! capture diagnostics on failure, and close the driver on every exit path,
//! panics included.

use crate::config::{HarnessConfig, TypingStrategy};
use crate::dialog::Dialog;
use crate::driver::{DriverLauncher, ElementHandle, PageDriver};
use crate::locator::Locator;
use crate::record::InputKind;
use crate::result::{SondaError, SondaResult};
use crate::wait::{Predicate, Waited, Waiter};
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

// =============================================================================
// SESSION
// =============================================================================

/// One driver plus the timing it is driven with
#[derive(Debug)]
pub struct Session<D: PageDriver> {
    driver: D,
    config: HarnessConfig,
    waiter: Waiter,
}

impl<D: PageDriver> Session<D> {
    /// Wrap a driver
    #[must_use]
    pub fn new(driver: D, config: HarnessConfig) -> Self {
        let waiter = Waiter::new(config.wait);
        Self {
            driver,
            config,
            waiter,
        }
    }

    /// Underlying driver
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Underlying driver, mutably
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Configuration in effect
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Wait engine bound to the configured timing
    #[must_use]
    pub const fn waiter(&self) -> &Waiter {
        &self.waiter
    }

    /// Give the driver back
    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Load `url`, then wait for `ready` to be present
    pub async fn navigate(&mut self, url: &str, ready: &Locator) -> SondaResult<ElementHandle> {
        info!(url, "navigate");
        self.driver.navigate(url).await?;
        self.wait_for(ready, Predicate::Present).await
    }

    /// Wait for an element predicate
    pub async fn wait_for(&self, locator: &Locator, predicate: Predicate) -> SondaResult<ElementHandle> {
        let Waited { value, .. } = self
            .waiter
            .element(&self.driver, locator, predicate)
            .await?;
        Ok(value)
    }

    /// Wait until the element is hidden or removed
    pub async fn wait_gone(&self, locator: &Locator) -> SondaResult<()> {
        self.waiter.gone(&self.driver, locator).await.map(|_| ())
    }

    /// Wait for clickable, then click; a stale target is re-resolved once
    pub async fn click(&mut self, locator: &Locator) -> SondaResult<()> {
        let handle = self.wait_for(locator, Predicate::Clickable).await?;
        debug!(%locator, %handle, "click");
        let first = match self.driver.click(&handle).await {
            Err(SondaError::StaleElement { handle }) => handle,
            other => return other,
        };

        warn!(%locator, handle = %first, "click target went stale, re-resolving");
        let handle = self.wait_for(locator, Predicate::Clickable).await?;
        match self.driver.click(&handle).await {
            Err(SondaError::StaleElement { handle }) => Err(SondaError::Interaction {
                query: locator.to_string(),
                message: format!("element detached at dispatch twice ({first}, then {handle})"),
            }),
            other => other,
        }
    }

    /// Type with the configured strategy
    pub async fn type_text(&mut self, locator: &Locator, text: &str) -> SondaResult<()> {
        let strategy = self.config.pacing.typing;
        self.type_with(locator, text, strategy).await
    }

    /// Type into a schema field; dates always go in as one value
    pub async fn type_field(&mut self, locator: &Locator, text: &str, input: InputKind) -> SondaResult<()> {
        let strategy = match input {
            InputKind::Date => TypingStrategy::Bulk,
            InputKind::Text | InputKind::LongText => self.config.pacing.typing,
        };
        self.type_with(locator, text, strategy).await
    }

    /// Wait for clickable, then type with an explicit strategy
    pub async fn type_with(
        &mut self,
        locator: &Locator,
        text: &str,
        strategy: TypingStrategy,
    ) -> SondaResult<()> {
        let handle = self.wait_for(locator, Predicate::Clickable).await?;
        debug!(%locator, chars = text.chars().count(), ?strategy, "type");
        let result = match strategy {
            TypingStrategy::Bulk => self.driver.send_keys(&handle, text).await,
            TypingStrategy::Paced { per_char_ms } => {
                let delay = Duration::from_millis(per_char_ms);
                let mut buf = [0_u8; 4];
                let mut result = Ok(());
                for c in text.chars() {
                    result = self.driver.send_keys(&handle, c.encode_utf8(&mut buf)).await;
                    if result.is_err() {
                        break;
                    }
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                }
                result
            }
        };
        result.map_err(|e| stale_as_interaction(e, locator))
    }

    /// Wait for present, then empty the field
    pub async fn clear(&mut self, locator: &Locator) -> SondaResult<()> {
        let handle = self.wait_for(locator, Predicate::Present).await?;
        debug!(%locator, "clear");
        self.driver
            .clear(&handle)
            .await
            .map_err(|e| stale_as_interaction(e, locator))
    }

    /// Wait for a native dialog and accept it
    pub async fn accept_dialog(&mut self) -> SondaResult<Dialog> {
        self.resolve_dialog(true).await
    }

    /// Wait for a native dialog and dismiss it
    pub async fn dismiss_dialog(&mut self) -> SondaResult<Dialog> {
        self.resolve_dialog(false).await
    }

    async fn resolve_dialog(&mut self, accept: bool) -> SondaResult<Dialog> {
        let waited = self.waiter.dialog(&self.driver).await.map_err(|e| match e {
            SondaError::Timeout { elapsed_ms, .. } => {
                SondaError::dialog(format!("no dialog appeared within {elapsed_ms}ms"))
            }
            other => other,
        })?;
        info!(
            kind = %waited.value.dialog_type(),
            message = waited.value.message(),
            accept,
            "resolving dialog"
        );
        self.driver.resolve_dialog(accept).await
    }

    /// Rendered text of an element once it is present
    pub async fn text_of(&self, locator: &Locator) -> SondaResult<String> {
        let handle = self.wait_for(locator, Predicate::Present).await?;
        self.driver
            .inspect(&handle)
            .await?
            .map(|s| s.text)
            .ok_or_else(|| SondaError::StaleElement { handle: handle.id })
    }

    /// Presentation pause between steps
    pub async fn pause(&self) {
        let delay = self.config.pacing.delay();
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}

fn stale_as_interaction(err: SondaError, locator: &Locator) -> SondaError {
    match err {
        SondaError::StaleElement { handle } => SondaError::Interaction {
            query: locator.to_string(),
            message: format!("element {handle} detached while in use"),
        },
        other => other,
    }
}

// =============================================================================
// SCOPED RUN
// =============================================================================

/// Work performed inside one scoped session
#[async_trait]
pub trait SessionTask: Send {
    /// Value produced on success
    type Output: Send;

    /// Name used for logs and artifact files
    fn name(&self) -> String {
        "session".to_string()
    }

    /// Drive the session
    async fn run<D: PageDriver>(&mut self, session: &mut Session<D>) -> SondaResult<Self::Output>;
}

/// State captured after a failure, best effort
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Page URL at the time of failure
    pub url: Option<String>,
    /// Screenshot written to the artifacts directory
    pub screenshot: Option<PathBuf>,
    /// Error chain, outermost first
    pub error_chain: Vec<String>,
    /// Problems hit while capturing
    pub capture_errors: Vec<String>,
}

impl Diagnostics {
    /// Collect URL and screenshot; never fails
    pub async fn capture<D: PageDriver>(
        session: &Session<D>,
        label: &str,
        error: &SondaError,
    ) -> Self {
        let mut diagnostics = Self {
            error_chain: error.chain(),
            ..Self::default()
        };

        match session.driver().current_url().await {
            Ok(url) => diagnostics.url = Some(url),
            Err(e) => diagnostics.capture_errors.push(format!("url: {e}")),
        }

        if let Some(dir) = session.config().artifacts_dir.clone() {
            match save_screenshot(session.driver(), dir, label).await {
                Ok(path) => diagnostics.screenshot = path,
                Err(e) => diagnostics.capture_errors.push(format!("screenshot: {e}")),
            }
        }

        for problem in &diagnostics.capture_errors {
            warn!(label, problem = problem.as_str(), "diagnostics incomplete");
        }
        diagnostics
    }
}

async fn save_screenshot<D: PageDriver>(
    driver: &D,
    dir: PathBuf,
    label: &str,
) -> SondaResult<Option<PathBuf>> {
    let png = driver.screenshot().await?;
    if png.is_empty() {
        return Ok(None);
    }
    tokio::fs::create_dir_all(&dir).await?;
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%3f");
    let path = dir.join(format!("{}-{stamp}.png", label.to_lowercase().replace(' ', "-")));
    tokio::fs::write(&path, png).await?;
    info!(path = %path.display(), "screenshot saved");
    Ok(Some(path))
}

/// Result of [`run_scoped`]
#[derive(Debug)]
pub struct Scoped<T> {
    /// What the task returned, or why it failed
    pub outcome: SondaResult<T>,
    /// Captured when the outcome is an error and a session existed
    pub diagnostics: Option<Diagnostics>,
    /// Result of closing the session; never replaces `outcome`
    pub release: SondaResult<()>,
}

/// Launch a session, run `task`, and close the session whatever happens
pub async fn run_scoped<L, T>(launcher: &L, config: &HarnessConfig, task: &mut T) -> Scoped<T::Output>
where
    L: DriverLauncher,
    T: SessionTask,
{
    let name = task.name();
    let driver = match launcher.launch().await {
        Ok(driver) => driver,
        Err(err) => {
            warn!(task = %name, error = %err, "session launch failed");
            return Scoped {
                outcome: Err(err),
                diagnostics: None,
                release: Ok(()),
            };
        }
    };

    let mut session = Session::new(driver, config.clone());
    let outcome = match AssertUnwindSafe(task.run(&mut session)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(SondaError::Panicked {
            message: panic_message(payload.as_ref()),
        }),
    };

    let diagnostics = match &outcome {
        Ok(_) => None,
        Err(err) => Some(Diagnostics::capture(&session, &name, err).await),
    };

    let mut driver = session.into_driver();
    let release = driver.close().await;
    match &release {
        Ok(()) => debug!(task = %name, "session released"),
        Err(err) => warn!(task = %name, error = %err, "session release failed"),
    }

    Scoped {
        outcome,
        diagnostics,
        release,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
