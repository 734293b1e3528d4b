//! Config command handler

use crate::commands::ConfigArgs;
use crate::config::build_harness_config;
use crate::error::CliResult;

/// Execute the config command
pub fn execute_config(args: &ConfigArgs) -> CliResult<()> {
    print!("{}", render_config(args)?);
    Ok(())
}

/// Effective configuration as YAML
pub fn render_config(args: &ConfigArgs) -> CliResult<String> {
    let config = build_harness_config(&args.settings)?;
    Ok(config.to_yaml()?)
}
