//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use sonda::{RecordKind, TypingStrategy, PRESENTATION_PER_CHAR_MS};
use std::path::PathBuf;

/// Sondador: run CRUD lifecycle scenarios against a live web application
#[derive(Parser, Debug)]
#[command(name = "sondador")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormatArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run lifecycle scenarios (create, edit, delete) per record kind
    Run(RunArgs),

    /// Show the element ids, routes and fixtures each kind relies on
    Kinds(KindsArgs),

    /// Print the effective configuration as YAML
    Config(ConfigArgs),
}

/// Settings shared by `run` and `config`; flags override the file
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Application root URL
    #[arg(long, env = "SONDA_BASE_URL")]
    pub base_url: Option<String>,

    /// Wait timeout in milliseconds
    #[arg(long, env = "SONDA_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Wait poll interval in milliseconds
    #[arg(long, env = "SONDA_POLL_MS")]
    pub poll_ms: Option<u64>,

    /// Pause between scenario steps in milliseconds
    #[arg(long, env = "SONDA_DELAY_MS")]
    pub delay_ms: Option<u64>,

    /// Typing strategy
    #[arg(long)]
    pub typing: Option<TypingArg>,

    /// Per-character delay for paced typing
    #[arg(long, default_value_t = PRESENTATION_PER_CHAR_MS)]
    pub per_char_ms: u64,

    /// Demo pacing: 1s between steps, 80ms per typed character
    #[arg(long)]
    pub presentation: bool,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the chromium sandbox (containers)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Path to the chromium binary
    #[arg(long, env = "CHROMIUM_PATH")]
    pub chromium_path: Option<String>,

    /// Directory for failure screenshots
    #[arg(long)]
    pub artifacts: Option<PathBuf>,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Record kinds to exercise (default: all)
    #[arg(short, long = "kind", value_name = "KIND")]
    pub kinds: Vec<KindArg>,

    /// Configuration
    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Write a JSON report here
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Stop after the first failed scenario
    #[arg(long)]
    pub fail_fast: bool,
}

/// Arguments for the kinds command
#[derive(Parser, Debug)]
pub struct KindsArgs {
    /// Only these kinds (default: all)
    #[arg(short, long = "kind", value_name = "KIND")]
    pub kinds: Vec<KindArg>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Configuration
    #[command(flatten)]
    pub settings: SettingsArgs,
}

/// Record kind argument
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindArg {
    /// Students (aluno)
    #[value(alias = "aluno")]
    Student,
    /// Authors (autor)
    #[value(alias = "autor")]
    Author,
}

impl From<KindArg> for RecordKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Student => Self::Student,
            KindArg::Author => Self::Author,
        }
    }
}

/// Selected kinds, or every kind when none were named
#[must_use]
pub fn selected_kinds(args: &[KindArg]) -> Vec<RecordKind> {
    if args.is_empty() {
        RecordKind::ALL.to_vec()
    } else {
        args.iter().map(|k| RecordKind::from(*k)).collect()
    }
}

/// Typing strategy argument
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypingArg {
    /// Whole value in one input call
    Bulk,
    /// One input call per character
    Paced,
}

impl TypingArg {
    /// Strategy with the given per-character delay
    #[must_use]
    pub const fn strategy(self, per_char_ms: u64) -> TypingStrategy {
        match self {
            Self::Bulk => TypingStrategy::Bulk,
            Self::Paced => TypingStrategy::Paced { per_char_ms },
        }
    }
}

/// Output format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// Human-readable text
    #[default]
    Text,
    /// JSON
    Json,
    /// YAML
    Yaml,
}

/// Color argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Auto-detect
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Log format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormatArg {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}
