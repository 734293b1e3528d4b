//! Harness configuration.
//!
//! Every section has serde defaults, so a YAML file only needs the keys it
//! changes:
//!
//! ```yaml
//! base_url: http://localhost:5500/frontend/index.html
//! wait:
//!   timeout_ms: 15000
//! pacing:
//!   inter_action_delay_ms: 500
//!   typing: !paced
//!     per_char_ms: 40
//! ```

use crate::browser::BrowserConfig;
use crate::record::DEFAULT_BASE_URL;
use crate::result::{SondaError, SondaResult};
use crate::wait::WaitOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Delay between steps in presentation mode
pub const PRESENTATION_DELAY_MS: u64 = 1_000;

/// Per-character delay in presentation mode
pub const PRESENTATION_PER_CHAR_MS: u64 = 80;

// =============================================================================
// PACING
// =============================================================================

/// How text reaches a field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypingStrategy {
    /// One input call with the whole text
    #[default]
    Bulk,
    /// One input call per character
    Paced {
        /// Delay after each character
        per_char_ms: u64,
    },
}

/// Presentation pacing; never a substitute for waiting on a condition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    /// Pause after each scenario step
    pub inter_action_delay_ms: u64,
    /// Default typing strategy
    pub typing: TypingStrategy,
}

impl Pacing {
    /// No pauses, bulk typing
    #[must_use]
    pub const fn none() -> Self {
        Self {
            inter_action_delay_ms: 0,
            typing: TypingStrategy::Bulk,
        }
    }

    /// Demo pacing: one second between steps, 80ms per character
    #[must_use]
    pub const fn presentation() -> Self {
        Self {
            inter_action_delay_ms: PRESENTATION_DELAY_MS,
            typing: TypingStrategy::Paced {
                per_char_ms: PRESENTATION_PER_CHAR_MS,
            },
        }
    }

    /// Set the inter-action delay
    #[must_use]
    pub const fn with_delay(mut self, delay_ms: u64) -> Self {
        self.inter_action_delay_ms = delay_ms;
        self
    }

    /// Set the typing strategy
    #[must_use]
    pub const fn with_typing(mut self, typing: TypingStrategy) -> Self {
        self.typing = typing;
        self
    }

    /// Inter-action delay as Duration
    #[must_use]
    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.inter_action_delay_ms)
    }
}

// =============================================================================
// HARNESS CONFIG
// =============================================================================

/// Everything a suite run needs besides the scenarios themselves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Application root
    pub base_url: String,
    /// Wait engine timing
    pub wait: WaitOptions,
    /// Presentation pacing
    pub pacing: Pacing,
    /// Browser launch options
    pub browser: BrowserConfig,
    /// Where failure screenshots are written
    pub artifacts_dir: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            wait: WaitOptions::default(),
            pacing: Pacing::default(),
            browser: BrowserConfig::default(),
            artifacts_dir: None,
        }
    }
}

impl HarnessConfig {
    /// Create a config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application root
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set wait options
    #[must_use]
    pub const fn with_wait(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    /// Set pacing
    #[must_use]
    pub const fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Set browser options
    #[must_use]
    pub fn with_browser(mut self, browser: BrowserConfig) -> Self {
        self.browser = browser;
        self
    }

    /// Set the artifacts directory
    #[must_use]
    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = Some(dir.into());
        self
    }

    /// Load from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> SondaResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SondaError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_yaml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse YAML and validate
    pub fn from_yaml_str(text: &str) -> SondaResult<Self> {
        let config: Self = serde_yaml_ng::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> SondaResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Check values that would make every scenario fail
    pub fn validate(&self) -> SondaResult<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(SondaError::config("base_url is empty"));
        }
        if !(url.starts_with("http://") || url.starts_with("https://") || url.starts_with("file://"))
        {
            return Err(SondaError::config(format!(
                "base_url `{url}` must start with http://, https:// or file://"
            )));
        }
        self.wait.validate()
    }
}
