//! Sondador: command-line front end for Sonda
//!
//! Parses flags, builds a [`sonda::HarnessConfig`], runs the selected
//! lifecycle scenarios and maps the aggregate verdict to the exit code.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod handlers;
mod logging;
mod output;
mod runner;

pub use commands::{
    selected_kinds, Cli, ColorArg, Commands, ConfigArgs, FormatArg, KindArg, KindsArgs,
    LogFormatArg, RunArgs, SettingsArgs, TypingArg,
};
pub use config::{build_harness_config, CliConfig, ColorChoice, LogFormat, Verbosity};
pub use error::{CliError, CliResult};
pub use logging::{env_filter, init_logging};
pub use output::{OutputFormat, ProgressReporter};
pub use runner::ScenarioRunner;

/// CLI configuration from global flags
#[must_use]
pub fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.clone().into())
        .with_log_format(cli.log_format.into())
}

/// Dispatch a parsed command line
pub fn dispatch(cli: Cli) -> CliResult<()> {
    let config = build_config(&cli);
    init_logging(&config);

    match cli.command {
        Commands::Run(args) => handlers::execute_run(&config, &args),
        Commands::Kinds(args) => handlers::execute_kinds(&args),
        Commands::Config(args) => handlers::execute_config(&args),
    }
}
