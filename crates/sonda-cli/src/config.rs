//! CLI configuration

use crate::commands::{LogFormatArg, SettingsArgs, TypingArg};
use crate::error::CliResult;
use serde::{Deserialize, Serialize};
use sonda::{HarnessConfig, Pacing};

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - minimal output
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - extra output
    Verbose,
    /// Debug - maximum output
    Debug,
}

impl Verbosity {
    /// Map `-q` and the `-v` count to a level
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }

    /// Check if debug mode
    #[must_use]
    pub const fn is_debug(self) -> bool {
        matches!(self, Self::Debug)
    }

    /// Default tracing filter for this level
    #[must_use]
    pub const fn log_level(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "info",
            Self::Debug => "debug",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::IsTerminal::is_terminal(&std::io::stdout()),
        }
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
    /// Log line format
    pub log_format: LogFormat,
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }

    /// Set log format
    #[must_use]
    pub const fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }
}

// =============================================================================
// HARNESS SETTINGS
// =============================================================================

/// Build the harness configuration: defaults, then the YAML file, then flags
/// and environment variables
pub fn build_harness_config(args: &SettingsArgs) -> CliResult<HarnessConfig> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::from_yaml_file(path)?,
        None => HarnessConfig::default(),
    };

    if let Some(url) = &args.base_url {
        config.base_url.clone_from(url);
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.wait.timeout_ms = timeout_ms;
    }
    if let Some(poll_ms) = args.poll_ms {
        config.wait.poll_interval_ms = poll_ms;
    }

    if args.presentation {
        config.pacing = Pacing::presentation();
    }
    if let Some(delay_ms) = args.delay_ms {
        config.pacing = config.pacing.with_delay(delay_ms);
    }
    if let Some(typing) = args.typing {
        config.pacing = config.pacing.with_typing(typing.strategy(args.per_char_ms));
    } else if args.presentation {
        config.pacing = config
            .pacing
            .with_typing(TypingArg::Paced.strategy(args.per_char_ms));
    }

    let mut browser = config.browser.clone();
    if args.headed {
        browser = browser.with_headless(false);
    }
    if args.no_sandbox {
        browser = browser.with_no_sandbox();
    }
    if let Some(path) = &args.chromium_path {
        browser = browser.with_chromium_path(path.clone());
    }
    config = config.with_browser(browser);
    if let Some(dir) = &args.artifacts {
        config.artifacts_dir = Some(dir.clone());
    }

    config.validate()?;
    tracing::debug!(base_url = %config.base_url, timeout_ms = config.wait.timeout_ms, "effective configuration");
    Ok(config)
}
