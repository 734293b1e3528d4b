//! Suite runner and reports.
//!
//! Every selected record kind gets its own [`Scenario`] in its own scoped
//! session. The suite passes only when every scenario passed.

use crate::config::HarnessConfig;
use crate::driver::DriverLauncher;
use crate::record::RecordKind;
use crate::result::{SondaError, SondaResult};
use crate::scenario::{Scenario, Stage, Transition};
use crate::session::{run_scoped, Diagnostics, Scoped};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Result of running one scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Record kind
    pub kind: RecordKind,
    /// Whether the full lifecycle completed
    pub passed: bool,
    /// Outermost error message if failed
    pub error: Option<String>,
    /// Taxonomy name of the root cause
    pub category: Option<String>,
    /// Error messages from outermost to root cause
    pub error_chain: Vec<String>,
    /// Last stage reached
    pub last_stage: Stage,
    /// Stage advances in order
    pub transcript: Vec<Transition>,
    /// Captured on failure
    pub diagnostics: Option<Diagnostics>,
    /// Error from closing the session, reported separately
    pub release_error: Option<String>,
    /// Wall time in milliseconds
    pub duration_ms: u64,
}

impl ScenarioResult {
    /// Build a result from a finished scenario and its scoped run
    #[must_use]
    pub fn from_run(scenario: &Scenario, scoped: Scoped<()>, duration_ms: u64) -> Self {
        let (passed, error, category, error_chain) = match &scoped.outcome {
            Ok(()) => (true, None, None, Vec::new()),
            Err(err) => (
                false,
                Some(err.to_string()),
                Some(err.root_cause().category().to_string()),
                err.chain(),
            ),
        };
        Self {
            kind: scenario.kind(),
            passed,
            error,
            category,
            error_chain,
            last_stage: scenario.stage(),
            transcript: scenario.transcript().to_vec(),
            diagnostics: scoped.diagnostics,
            release_error: scoped.release.err().map(|e| e.to_string()),
            duration_ms,
        }
    }

    /// Name shown in progress output
    #[must_use]
    pub fn name(&self) -> String {
        format!("{} lifecycle", self.kind)
    }
}

/// Results from running a suite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Unique run identifier
    pub run_id: Uuid,
    /// When the first scenario started
    pub started_at: DateTime<Utc>,
    /// When the last scenario finished
    pub finished_at: DateTime<Utc>,
    /// Application root that was exercised
    pub base_url: String,
    /// Individual scenario results
    pub results: Vec<ScenarioResult>,
    /// Aggregate verdict
    pub passed: bool,
}

impl SuiteReport {
    /// Check if all scenarios passed
    ///
    /// An empty suite does not pass.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|r| r.passed)
    }

    /// Count passed scenarios
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    /// Count failed scenarios
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    /// Get total scenario count
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Get failed scenarios
    #[must_use]
    pub fn failures(&self) -> Vec<&ScenarioResult> {
        self.results.iter().filter(|r| !r.passed).collect()
    }

    /// Write as pretty JSON, creating parent directories
    pub fn write_json(&self, path: impl AsRef<Path>) -> SondaResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "report written");
        Ok(())
    }
}

/// Runs scenarios for a set of record kinds
#[derive(Debug, Clone)]
pub struct Suite {
    config: HarnessConfig,
    kinds: Vec<RecordKind>,
    fail_fast: bool,
}

impl Suite {
    /// Suite over every record kind
    #[must_use]
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            kinds: RecordKind::ALL.to_vec(),
            fail_fast: false,
        }
    }

    /// Restrict to the given kinds, in order, without duplicates
    #[must_use]
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = RecordKind>) -> Self {
        self.kinds.clear();
        for kind in kinds {
            if !self.kinds.contains(&kind) {
                self.kinds.push(kind);
            }
        }
        self
    }

    /// Stop after the first failed scenario
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Selected kinds
    #[must_use]
    pub fn kinds(&self) -> &[RecordKind] {
        &self.kinds
    }

    /// Harness configuration
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run every selected scenario
    pub async fn run<L: DriverLauncher>(&self, launcher: &L) -> SondaResult<SuiteReport> {
        self.run_with(launcher, |_| {}).await
    }

    /// Run every selected scenario, reporting each result as it finishes
    pub async fn run_with<L, F>(&self, launcher: &L, mut on_result: F) -> SondaResult<SuiteReport>
    where
        L: DriverLauncher,
        F: FnMut(&ScenarioResult) + Send,
    {
        self.config.validate()?;
        if self.kinds.is_empty() {
            return Err(SondaError::config("no record kinds selected"));
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, kinds = self.kinds.len(), base_url = %self.config.base_url, "suite started");

        let mut results = Vec::with_capacity(self.kinds.len());
        for &kind in &self.kinds {
            let mut scenario = Scenario::new(kind);
            let start = Instant::now();
            let scoped = run_scoped(launcher, &self.config, &mut scenario).await;
            let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            let result = ScenarioResult::from_run(&scenario, scoped, duration_ms);

            if result.passed {
                info!(%kind, duration_ms, "scenario passed");
            } else {
                warn!(
                    %kind,
                    stage = %result.last_stage,
                    error = result.error.as_deref().unwrap_or_default(),
                    "scenario failed"
                );
            }
            on_result(&result);
            let stop = self.fail_fast && !result.passed;
            results.push(result);
            if stop {
                warn!("fail-fast: skipping remaining scenarios");
                break;
            }
        }

        let mut report = SuiteReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            base_url: self.config.base_url.clone(),
            results,
            passed: false,
        };
        report.passed = report.all_passed();
        info!(
            %run_id,
            passed = report.passed_count(),
            failed = report.failed_count(),
            "suite finished"
        );
        Ok(report)
    }
}
