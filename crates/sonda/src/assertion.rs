//! Assertions over rendered text.
//!
//! The pure checks in [`Assertion`] judge text that was already extracted.
//! [`assert_text_contains`] and [`assert_text_absent`] read a container
//! through the wait engine: they keep re-reading until the check passes or
//! the wait times out, then report the last text they saw. They are meant
//! for lists that re-render; a feedback message is read once and judged with
//! [`Assertion`] directly.

use crate::driver::PageDriver;
use crate::locator::Locator;
use crate::result::{SondaError, SondaResult};
use crate::session::Session;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Outcome of one assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the assertion passed
    pub passed: bool,
    /// Human-readable message
    pub message: String,
    /// What was expected
    pub expected: String,
    /// Text actually observed
    pub actual: String,
}

impl Verdict {
    /// Create a passing verdict
    #[must_use]
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            expected: String::new(),
            actual: String::new(),
        }
    }

    /// Create a failing verdict
    #[must_use]
    pub fn fail(
        message: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            passed: false,
            message: message.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Turn a failure into [`SondaError::Assertion`]
    pub fn into_result(self) -> SondaResult<Self> {
        if self.passed {
            Ok(self)
        } else {
            Err(SondaError::Assertion {
                expected: self.expected,
                actual: self.actual,
                message: self.message,
            })
        }
    }
}

/// How many expected values must appear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMode {
    /// At least one
    Any,
    /// Every one
    All,
}

/// Text comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseMode {
    /// Exact
    Sensitive,
    /// Unicode lowercase on both sides
    Insensitive,
}

impl CaseMode {
    fn normalize(self, text: &str) -> String {
        match self {
            Self::Sensitive => text.to_string(),
            Self::Insensitive => text.to_lowercase(),
        }
    }
}

fn quoted<S: AsRef<str>>(values: &[S]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{:?}", v.as_ref())).collect();
    format!("[{}]", parts.join(", "))
}

/// Pure text assertions
#[derive(Debug, Clone, Copy)]
pub struct Assertion;

impl Assertion {
    /// Check that `text` contains any or all of `expected`
    #[must_use]
    pub fn text_contains<S: AsRef<str>>(
        text: &str,
        expected: &[S],
        mode: MatchMode,
        case: CaseMode,
    ) -> Verdict {
        let haystack = case.normalize(text);
        let (found, missing): (Vec<&S>, Vec<&S>) = expected
            .iter()
            .partition(|needle| haystack.contains(&case.normalize(needle.as_ref())));
        let passed = match mode {
            MatchMode::Any => !found.is_empty(),
            MatchMode::All => missing.is_empty(),
        };
        let scope = match mode {
            MatchMode::Any => "any of",
            MatchMode::All => "all of",
        };
        if passed {
            Verdict::pass(format!("text contains {scope} {}", quoted(expected)))
        } else {
            let missing: Vec<&str> = missing.iter().map(|m| m.as_ref()).collect();
            Verdict::fail(
                format!("text is missing {}", quoted(&missing)),
                format!("{scope} {}", quoted(expected)),
                text,
            )
        }
    }

    /// Check that `text` contains none of `forbidden`
    #[must_use]
    pub fn text_absent<S: AsRef<str>>(text: &str, forbidden: &[S], case: CaseMode) -> Verdict {
        let haystack = case.normalize(text);
        let present: Vec<&str> = forbidden
            .iter()
            .map(AsRef::as_ref)
            .filter(|needle| haystack.contains(&case.normalize(needle)))
            .collect();
        if present.is_empty() {
            Verdict::pass(format!("text contains none of {}", quoted(forbidden)))
        } else {
            Verdict::fail(
                format!("text still contains {}", quoted(&present)),
                format!("none of {}", quoted(forbidden)),
                text,
            )
        }
    }
}

/// Occurrences of `old` not accounted for by occurrences of `new`
fn standalone_count(haystack: &str, old: &str, new: &str) -> usize {
    if old.is_empty() {
        return 0;
    }
    let embedded = new.matches(old).count();
    haystack
        .matches(old)
        .count()
        .saturating_sub(haystack.matches(new).count() * embedded)
}

impl Assertion {
    /// Check that each `(before, after)` pair was replaced: `before` only
    /// appears inside occurrences of `after`
    #[must_use]
    pub fn text_superseded<S: AsRef<str>>(
        text: &str,
        pairs: &[(S, S)],
        case: CaseMode,
    ) -> Verdict {
        let haystack = case.normalize(text);
        let lingering: Vec<&str> = pairs
            .iter()
            .filter(|(before, after)| {
                let before = case.normalize(before.as_ref());
                let after = case.normalize(after.as_ref());
                standalone_count(&haystack, &before, &after) > 0
            })
            .map(|(before, _)| before.as_ref())
            .collect();
        let olds: Vec<&str> = pairs.iter().map(|(before, _)| before.as_ref()).collect();
        if lingering.is_empty() {
            Verdict::pass(format!("text no longer shows {} on its own", quoted(&olds)))
        } else {
            Verdict::fail(
                format!("text still shows {} besides the new values", quoted(&lingering)),
                format!("{} replaced", quoted(&olds)),
                text,
            )
        }
    }
}

/// Wait until the container's text contains the expected values
///
/// Returns the last verdict once the wait runs out; fails only when the
/// container could never be read.
pub async fn assert_text_contains<D, S>(
    session: &Session<D>,
    container: &Locator,
    expected: &[S],
    mode: MatchMode,
    case: CaseMode,
) -> SondaResult<Verdict>
where
    D: PageDriver,
    S: AsRef<str> + Sync,
{
    settle(session, container, "contain the expected text", |text| {
        Assertion::text_contains(text, expected, mode, case)
    })
    .await
}

/// Wait until the container's text contains none of the forbidden values
pub async fn assert_text_absent<D, S>(
    session: &Session<D>,
    container: &Locator,
    forbidden: &[S],
    case: CaseMode,
) -> SondaResult<Verdict>
where
    D: PageDriver,
    S: AsRef<str> + Sync,
{
    settle(session, container, "drop the forbidden text", |text| {
        Assertion::text_absent(text, forbidden, case)
    })
    .await
}

/// Wait until every pre-edit value has been replaced by its new value
pub async fn assert_text_superseded<D, S>(
    session: &Session<D>,
    container: &Locator,
    pairs: &[(S, S)],
    case: CaseMode,
) -> SondaResult<Verdict>
where
    D: PageDriver,
    S: AsRef<str> + Sync,
{
    settle(session, container, "drop the replaced text", |text| {
        Assertion::text_superseded(text, pairs, case)
    })
    .await
}

async fn settle<D, F>(
    session: &Session<D>,
    container: &Locator,
    condition: &str,
    check: F,
) -> SondaResult<Verdict>
where
    D: PageDriver,
    F: Fn(&str) -> Verdict + Sync,
{
    container.validate()?;
    let last: Mutex<Option<Verdict>> = Mutex::new(None);
    let driver = session.driver();
    let (check, last_ref) = (&check, &last);
    let description = format!("text of {container} to {condition}");

    let waited = session
        .waiter()
        .poll(&description, move || async move {
            let found = container.locate(driver, None).await?;
            let Some(state) = driver.inspect(&found.handle).await? else {
                return Err(SondaError::StaleElement {
                    handle: found.handle.id,
                });
            };
            let verdict = check(&state.text);
            if verdict.passed {
                return Ok(Some(verdict));
            }
            if let Ok(mut slot) = last_ref.lock() {
                *slot = Some(verdict);
            }
            Ok(None)
        })
        .await;

    match waited {
        Ok(waited) => Ok(waited.value),
        Err(err @ SondaError::Timeout { .. }) => {
            let observed = last.into_inner().ok().flatten();
            observed.ok_or(err)
        }
        Err(err) => Err(err),
    }
}
