//! Result and error types for Sonda.
//!
//! The variants split into two groups. `NotFound` and `StaleElement` are
//! absorbed close to where they happen (locator fallbacks, wait polling, the
//! single click retry). Everything else is terminal for the scenario step and
//! propagates with `?` up to the orchestrator.

use crate::record::RecordKind;
use crate::scenario::Phase;
use thiserror::Error;

/// Result type for Sonda operations
pub type SondaResult<T> = Result<T, SondaError>;

/// Errors that can occur while driving a scenario
#[derive(Debug, Error)]
pub enum SondaError {
    /// Locator query matched nothing
    #[error("No element matched {query}")]
    NotFound {
        /// Last query that was tried
        query: String,
    },

    /// Query could not be parsed or is empty
    #[error("Malformed query `{query}`: {message}")]
    MalformedQuery {
        /// Offending query
        query: String,
        /// Parse failure
        message: String,
    },

    /// Wait condition never became true
    #[error("Timed out after {elapsed_ms}ms (limit {timeout_ms}ms) waiting for {waited_for}")]
    Timeout {
        /// Predicate description
        waited_for: String,
        /// Time actually spent polling
        elapsed_ms: u64,
        /// Configured limit
        timeout_ms: u64,
    },

    /// Handle no longer refers to an attached node
    #[error("Element {handle} is detached from the document")]
    StaleElement {
        /// Handle identifier
        handle: String,
    },

    /// Action could not be dispatched
    #[error("Interaction with {query} failed: {message}")]
    Interaction {
        /// Locator the action targeted
        query: String,
        /// Error message
        message: String,
    },

    /// Expected native dialog did not appear, or could not be resolved
    #[error("Dialog error: {message}")]
    Dialog {
        /// Error message
        message: String,
    },

    /// Observed state did not match the expectation
    #[error("Assertion failed: {message} (expected {expected}, observed {actual:?})")]
    Assertion {
        /// What was expected
        expected: String,
        /// Text actually observed
        actual: String,
        /// Error message
        message: String,
    },

    /// Failure inside a named scenario phase
    #[error("{kind} scenario failed during {phase}: {source}")]
    Scenario {
        /// Record kind under test
        kind: RecordKind,
        /// Phase that failed
        phase: Phase,
        /// Original cause
        source: Box<SondaError>,
    },

    /// Operation called in the wrong state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Page-level driver error
    #[error("Page error: {message}")]
    Page {
        /// Error message
        message: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Scenario body panicked
    #[error("Scenario panicked: {message}")]
    Panicked {
        /// Panic payload, when it was a string
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl SondaError {
    /// Create a page error
    #[must_use]
    pub fn page(message: impl Into<String>) -> Self {
        Self::Page {
            message: message.into(),
        }
    }

    /// Create a dialog error
    #[must_use]
    pub fn dialog(message: impl Into<String>) -> Self {
        Self::Dialog {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid state error
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Wrap this error with the scenario phase it happened in
    #[must_use]
    pub fn in_phase(self, kind: RecordKind, phase: Phase) -> Self {
        Self::Scenario {
            kind,
            phase,
            source: Box::new(self),
        }
    }

    /// Innermost error beneath any scenario wrapping
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Scenario { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Taxonomy name used in reports
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFound",
            Self::MalformedQuery { .. } => "MalformedQuery",
            Self::Timeout { .. } => "TimeoutError",
            Self::StaleElement { .. } | Self::Interaction { .. } => "InteractionError",
            Self::Dialog { .. } => "DialogError",
            Self::Assertion { .. } => "AssertionFailure",
            Self::Scenario { .. } => "ScenarioFailure",
            Self::InvalidState { .. } => "InvalidState",
            Self::BrowserLaunch { .. } | Self::Navigation { .. } | Self::Page { .. } => {
                "DriverError"
            }
            Self::Config { .. } => "ConfigError",
            Self::Panicked { .. } => "Panic",
            Self::Io(_) | Self::Json(_) | Self::Yaml(_) => "IoError",
        }
    }

    /// Errors the wait loop treats as "not yet" rather than failure
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::StaleElement { .. })
    }

    /// Messages from the outermost error down to the root cause
    #[must_use]
    pub fn chain(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = self;
        loop {
            match current {
                Self::Scenario {
                    kind,
                    phase,
                    source,
                } => {
                    out.push(format!("{kind} scenario failed during {phase}"));
                    current = source;
                }
                other => {
                    out.push(other.to_string());
                    return out;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod display_tests {
        use super::*;

        #[test]
        fn test_timeout_message_carries_predicate_and_elapsed() {
            let err = SondaError::Timeout {
                waited_for: "#form-cadastro to be present".to_string(),
                elapsed_ms: 10_000,
                timeout_ms: 10_000,
            };
            let text = err.to_string();
            assert!(text.contains("#form-cadastro to be present"));
            assert!(text.contains("10000ms"));
        }

        #[test]
        fn test_assertion_message_carries_observed_text() {
            let err = SondaError::Assertion {
                expected: "any of [sucesso, cadastrado]".to_string(),
                actual: "Erro ao salvar".to_string(),
                message: "success message".to_string(),
            };
            assert!(err.to_string().contains("Erro ao salvar"));
            assert!(err.to_string().contains("sucesso"));
        }
    }

    mod wrapping_tests {
        use super::*;

        #[test]
        fn test_in_phase_preserves_cause() {
            let err = SondaError::dialog("no dialog appeared within 10000ms")
                .in_phase(RecordKind::Author, Phase::Delete);
            let text = err.to_string();
            assert!(text.contains("Author"));
            assert!(text.contains("delete"));
            assert!(text.contains("no dialog appeared"));
            assert!(matches!(err.root_cause(), SondaError::Dialog { .. }));
        }

        #[test]
        fn test_chain_lists_outer_to_inner() {
            let err = SondaError::NotFound {
                query: "#tbody-alunos".to_string(),
            }
            .in_phase(RecordKind::Student, Phase::Edit);
            let chain = err.chain();
            assert_eq!(chain.len(), 2);
            assert!(chain[0].contains("edit"));
            assert!(chain[1].contains("#tbody-alunos"));
        }

        #[test]
        fn test_source_is_exposed() {
            use std::error::Error as _;
            let err = SondaError::page("boom").in_phase(RecordKind::Student, Phase::Create);
            assert!(err.source().is_some());
        }
    }

    mod category_tests {
        use super::*;

        #[test]
        fn test_taxonomy_names() {
            assert_eq!(
                SondaError::NotFound {
                    query: "x".to_string()
                }
                .category(),
                "NotFound"
            );
            assert_eq!(
                SondaError::StaleElement {
                    handle: "h1".to_string()
                }
                .category(),
                "InteractionError"
            );
            assert_eq!(SondaError::dialog("x").category(), "DialogError");
        }

        #[test]
        fn test_transient_kinds() {
            assert!(SondaError::NotFound {
                query: "x".to_string()
            }
            .is_transient());
            assert!(!SondaError::page("x").is_transient());
        }
    }
}
