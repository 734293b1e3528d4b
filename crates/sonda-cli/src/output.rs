//! Output formatting and progress reporting

use crate::commands::FormatArg;
use crate::error::CliResult;
use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use sonda::ScenarioResult;
use std::time::Duration;

/// Output format for structured listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
            FormatArg::Yaml => Self::Yaml,
        }
    }
}

impl OutputFormat {
    /// Serialize `value` for the structured formats; `None` for text
    pub fn render<T: Serialize>(self, value: &T) -> CliResult<Option<String>> {
        Ok(match self {
            Self::Text => None,
            Self::Json => Some(serde_json::to_string_pretty(value)?),
            Self::Yaml => Some(serde_yaml_ng::to_string(value)?),
        })
    }
}

/// Progress reporter for scenario execution
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Start a progress bar over the scenarios
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Increment progress
    pub fn increment(&self, delta: u64) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(delta);
        }
    }

    /// Update progress message
    pub fn set_message(&self, message: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(message.to_string());
        }
    }

    /// Finish progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_and_clear();
        }
    }

    fn line(&self, text: &str) {
        match self.progress_bar {
            Some(ref pb) if !pb.is_finished() => pb.suspend(|| {
                let _ = self.term.write_line(text);
            }),
            _ => {
                let _ = self.term.write_line(text);
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };

        self.line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Failures print even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };

        self.line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };

        self.line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };

        self.line(&format!("{prefix} {message}"));
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }

        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };

        self.line("");
        self.line(&styled);
    }

    /// Print the outcome of one scenario, with detail for failures
    pub fn scenario(&self, result: &ScenarioResult, verbose: bool) {
        let secs = Duration::from_millis(result.duration_ms).as_secs_f64();
        if result.passed {
            self.success(&format!("{} ({secs:.2}s)", result.name()));
        } else {
            self.failure(&format!(
                "{} [{}] at {} ({secs:.2}s)",
                result.name(),
                result.category.as_deref().unwrap_or("Error"),
                result.last_stage,
            ));
            for (depth, cause) in result.error_chain.iter().enumerate() {
                self.line(&format!("    {}{cause}", "  ".repeat(depth)));
            }
            if let Some(diagnostics) = &result.diagnostics {
                if let Some(url) = &diagnostics.url {
                    self.line(&format!("    url: {url}"));
                }
                if let Some(shot) = &diagnostics.screenshot {
                    self.line(&format!("    screenshot: {}", shot.display()));
                }
            }
        }

        if let Some(release) = &result.release_error {
            self.warning(&format!("{}: session release failed: {release}", result.name()));
        }

        if verbose && !self.quiet {
            for step in &result.transcript {
                self.line(&format!(
                    "    {:>7}ms  {} -> {}  {}",
                    step.at_ms, step.from, step.to, step.note
                ));
            }
        }
    }

    /// Print the run summary
    pub fn summary(&self, passed: usize, failed: usize, duration: Duration) {
        if self.quiet && failed == 0 {
            return;
        }

        self.line("");

        let total = passed + failed;
        let duration_secs = duration.as_secs_f64();

        if self.use_color {
            let passed_style = Style::new().green().bold();
            let failed_style = Style::new().red().bold();

            let status = if failed > 0 || total == 0 {
                failed_style.apply_to("FAILED")
            } else {
                passed_style.apply_to("PASSED")
            };

            self.line(&format!(
                "{} {} scenario(s) in {:.2}s ({} passed, {} failed)",
                status,
                total,
                duration_secs,
                passed_style.apply_to(passed),
                if failed > 0 {
                    failed_style.apply_to(failed).to_string()
                } else {
                    failed.to_string()
                },
            ));
        } else {
            let status = if failed > 0 || total == 0 {
                "FAILED"
            } else {
                "PASSED"
            };
            self.line(&format!(
                "{status} {total} scenario(s) in {duration_secs:.2}s ({passed} passed, {failed} failed)"
            ));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod output_format_tests {
        use super::*;

        #[test]
        fn test_default() {
            assert_eq!(OutputFormat::default(), OutputFormat::Text);
        }

        #[test]
        fn test_from_arg() {
            assert_eq!(OutputFormat::from(FormatArg::Yaml), OutputFormat::Yaml);
            assert_eq!(OutputFormat::from(FormatArg::Json), OutputFormat::Json);
        }

        #[test]
        fn test_render() {
            let value = serde_json::json!({ "kind": "student" });
            assert!(OutputFormat::Text.render(&value).unwrap().is_none());
            let json = OutputFormat::Json.render(&value).unwrap().unwrap();
            assert!(json.contains("\"kind\": \"student\""));
            let yaml = OutputFormat::Yaml.render(&value).unwrap().unwrap();
            assert!(yaml.contains("kind: student"));
        }
    }

    mod reporter_tests {
        use super::*;

        #[test]
        fn test_quiet_reporter_skips_progress() {
            let mut reporter = ProgressReporter::new(false, true);
            reporter.start_progress(2, "Starting...");
            assert!(reporter.progress_bar.is_none());
            reporter.increment(1);
            reporter.finish();
        }

        #[test]
        fn test_progress_lifecycle() {
            let mut reporter = ProgressReporter::new(false, false);
            reporter.start_progress(2, "Starting...");
            reporter.set_message("student scenario");
            reporter.increment(1);
            reporter.finish();
            assert!(reporter.progress_bar.as_ref().unwrap().is_finished());
        }

        #[test]
        fn test_messages_do_not_panic() {
            let reporter = ProgressReporter::new(true, false);
            reporter.header("Scenarios");
            reporter.info("info");
            reporter.warning("warn");
            reporter.success("ok");
            reporter.failure("bad");
            reporter.summary(1, 1, Duration::from_millis(1500));
            reporter.summary(0, 0, Duration::ZERO);
        }
    }
}
