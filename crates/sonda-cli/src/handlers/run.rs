//! Run command handler

use crate::commands::{selected_kinds, RunArgs};
use crate::config::{build_harness_config, CliConfig};
use crate::error::CliResult;
use crate::runner::ScenarioRunner;
use sonda::Suite;

/// Suite described by the run arguments, validated
pub fn build_suite(args: &RunArgs) -> CliResult<Suite> {
    let harness = build_harness_config(&args.settings)?;
    Ok(Suite::new(harness)
        .with_kinds(selected_kinds(&args.kinds))
        .with_fail_fast(args.fail_fast))
}

/// Execute the run command
///
/// Ok only when every selected scenario passed.
pub fn execute_run(config: &CliConfig, args: &RunArgs) -> CliResult<()> {
    let suite = build_suite(args)?;
    let mut runner = ScenarioRunner::new(config.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(run_in_browser(&mut runner, &suite))?;

    runner.conclude(&report, args.report.as_deref())
}

#[cfg(feature = "browser")]
async fn run_in_browser(
    runner: &mut ScenarioRunner,
    suite: &Suite,
) -> CliResult<sonda::SuiteReport> {
    let launcher = sonda::ChromiumLauncher::new(suite.config().browser.clone());
    runner.execute(suite, &launcher).await
}

#[cfg(not(feature = "browser"))]
#[allow(clippy::unused_async)]
async fn run_in_browser(
    _runner: &mut ScenarioRunner,
    _suite: &Suite,
) -> CliResult<sonda::SuiteReport> {
    Err(crate::error::CliError::config(
        "sondador was built without the `browser` feature",
    ))
}
