//! Scenario runner

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use sonda::{DriverLauncher, Suite, SuiteReport};
use std::path::Path;
use std::time::Duration;

/// Runs a suite and reports each scenario as it finishes
#[derive(Debug)]
pub struct ScenarioRunner {
    config: CliConfig,
    reporter: ProgressReporter,
}

impl ScenarioRunner {
    /// Create a new scenario runner
    #[must_use]
    pub fn new(config: CliConfig) -> Self {
        let reporter =
            ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
        Self { config, reporter }
    }

    /// Run every scenario of `suite` on sessions from `launcher`
    ///
    /// # Errors
    ///
    /// Returns error if the suite cannot start (invalid configuration, no
    /// kinds). Scenario failures are part of the returned report.
    pub async fn execute<L: DriverLauncher>(
        &mut self,
        suite: &Suite,
        launcher: &L,
    ) -> CliResult<SuiteReport> {
        self.reporter.header("Running Scenarios");
        self.reporter
            .start_progress(suite.kinds().len() as u64, "Starting...");

        let verbose = self.config.verbosity.is_verbose();
        let reporter = &self.reporter;
        let outcome = suite
            .run_with(launcher, |result| {
                reporter.scenario(result, verbose);
                reporter.increment(1);
            })
            .await;
        self.reporter.finish();
        let report = outcome?;

        let elapsed = (report.finished_at - report.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        self.reporter
            .summary(report.passed_count(), report.failed_count(), elapsed);
        Ok(report)
    }

    /// Write the report if requested and turn the verdict into a result
    ///
    /// # Errors
    ///
    /// Returns error if the report cannot be written or any scenario failed
    pub fn conclude(&self, report: &SuiteReport, report_path: Option<&Path>) -> CliResult<()> {
        if let Some(path) = report_path {
            report.write_json(path)?;
            self.reporter
                .info(&format!("Report written to {}", path.display()));
        }

        if report.passed {
            Ok(())
        } else {
            Err(CliError::scenario_failures(
                report.failed_count(),
                report.total(),
            ))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::Verbosity;
    use sonda::memory::{MemoryDriver, MemoryLauncher};
    use sonda::{HarnessConfig, RecordKind, SondaError, WaitOptions};

    fn quiet_runner() -> ScenarioRunner {
        ScenarioRunner::new(CliConfig::new().with_verbosity(Verbosity::Quiet))
    }

    fn fast_config() -> HarnessConfig {
        HarnessConfig::default().with_wait(WaitOptions::new().with_timeout(200).with_poll_interval(20))
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_page_fails_every_scenario() {
        let launcher = MemoryLauncher::new(MemoryDriver::default);
        let suite = Suite::new(fast_config());

        let report = quiet_runner().execute(&suite, &launcher).await.unwrap();

        assert!(!report.passed);
        assert_eq!(report.failed_count(), 2);
        assert!(report
            .results
            .iter()
            .all(|r| r.category.as_deref() == Some("TimeoutError")));
        assert!(launcher.launched().iter().all(MemoryDriver::is_closed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_config_stops_before_launch() {
        let launcher = MemoryLauncher::new(MemoryDriver::default);
        let suite = Suite::new(fast_config().with_base_url("ftp://nowhere"));

        let err = quiet_runner().execute(&suite, &launcher).await.unwrap_err();

        assert!(matches!(err, CliError::Sonda(SondaError::Config { .. })));
        assert!(launcher.launched().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_conclude_writes_report_and_fails() {
        let launcher = MemoryLauncher::new(MemoryDriver::default);
        let suite = Suite::new(fast_config())
            .with_kinds([RecordKind::Author])
            .with_fail_fast(true);
        let mut runner = quiet_runner();
        let report = runner.execute(&suite, &launcher).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");
        let err = runner.conclude(&report, Some(&path)).unwrap_err();

        assert_eq!(err.to_string(), "1 of 1 scenario(s) failed");
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"kind\": \"author\""));
    }

    #[test]
    fn test_conclude_passes_on_green_report() {
        let report: SuiteReport = serde_json::from_value(serde_json::json!({
            "run_id": "00000000-0000-0000-0000-000000000000",
            "started_at": "2026-01-01T00:00:00Z",
            "finished_at": "2026-01-01T00:00:05Z",
            "base_url": "http://127.0.0.1:5500/frontend/index.html",
            "results": [],
            "passed": true
        }))
        .unwrap();
        quiet_runner().conclude(&report, None).unwrap();
    }
}
