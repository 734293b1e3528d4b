//! Wait Engine
//!
//! The single synchronization primitive: poll the document at a fixed
//! interval until a predicate holds or the timeout elapses.
//!
//! - Returns on the first successful check; there is no minimum wait.
//! - The last sleep is clamped to the remaining budget, so a wait never
//!   blocks past `timeout + poll_interval`.
//! - `NotFound` and `StaleElement` during a check mean "not yet". Any other
//!   error propagates at once.
//!
//! All sleeping goes through `tokio::time`, so tests can run under a paused
//! clock.

use crate::dialog::Dialog;
use crate::driver::{ElementHandle, ElementState, PageDriver};
use crate::locator::Locator;
use crate::result::{SondaError, SondaResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, trace};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (10 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;

/// Default polling interval (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject a zero poll interval
    pub fn validate(&self) -> SondaResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(SondaError::config("poll_interval_ms must be greater than zero"));
        }
        Ok(())
    }
}

// =============================================================================
// PREDICATES
// =============================================================================

/// Element predicate evaluated on every poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Predicate {
    /// Attached to the document
    Present,
    /// Present and rendered
    Visible,
    /// Present, visible, enabled and not obscured
    Clickable,
    /// Not rendered, or not in the document at all
    InvisibleOrAbsent,
}

impl Predicate {
    /// Human-readable name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Visible => "visible",
            Self::Clickable => "clickable",
            Self::InvisibleOrAbsent => "invisible or absent",
        }
    }

    /// Evaluate against an element snapshot; `None` means no element
    #[must_use]
    pub fn holds(&self, state: Option<&ElementState>) -> bool {
        match (self, state) {
            (Self::InvisibleOrAbsent, None) => true,
            (Self::InvisibleOrAbsent, Some(s)) => !s.displayed,
            (_, None) => false,
            (Self::Present, Some(_)) => true,
            (Self::Visible, Some(s)) => s.displayed,
            (Self::Clickable, Some(s)) => s.is_clickable(),
        }
    }

    /// Whether success implies an element exists
    #[must_use]
    pub const fn needs_element(&self) -> bool {
        !matches!(self, Self::InvisibleOrAbsent)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// WAITER
// =============================================================================

/// Outcome of a satisfied wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Waited<T> {
    /// Value produced by the successful check
    pub value: T,
    /// Time spent waiting
    pub elapsed: Duration,
    /// Description of the condition
    pub waited_for: String,
    /// Number of checks performed
    pub polls: u32,
}

/// Poll loop bound to one set of [`WaitOptions`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Waiter {
    options: WaitOptions,
}

impl Waiter {
    /// Create a waiter
    #[must_use]
    pub const fn new(options: WaitOptions) -> Self {
        Self { options }
    }

    /// Options in effect
    #[must_use]
    pub const fn options(&self) -> &WaitOptions {
        &self.options
    }

    /// Same waiter with a different timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.options.timeout_ms = timeout_ms;
        self
    }

    /// Run `probe` until it yields a value or the timeout elapses
    pub async fn poll<T, F, Fut>(&self, description: &str, mut probe: F) -> SondaResult<Waited<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SondaResult<Option<T>>>,
    {
        let timeout = self.options.timeout();
        let interval = self.options.poll_interval().max(Duration::from_millis(1));
        let start = Instant::now();
        let mut polls = 0_u32;

        loop {
            polls += 1;
            match probe().await {
                Ok(Some(value)) => {
                    let elapsed = start.elapsed();
                    debug!(condition = description, ?elapsed, polls, "wait satisfied");
                    return Ok(Waited {
                        value,
                        elapsed,
                        waited_for: description.to_string(),
                        polls,
                    });
                }
                Ok(None) => {}
                Err(err) if err.is_transient() => {
                    trace!(condition = description, error = %err, "not yet");
                }
                Err(err) => return Err(err),
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                debug!(condition = description, ?elapsed, polls, "wait timed out");
                return Err(SondaError::Timeout {
                    waited_for: description.to_string(),
                    elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    timeout_ms: self.options.timeout_ms,
                });
            }
            sleep(interval.min(timeout - elapsed)).await;
        }
    }

    /// Wait until `predicate` holds for the element `locator` resolves to
    ///
    /// The value is the matched handle; it is `None` only for
    /// [`Predicate::InvisibleOrAbsent`] when nothing matched.
    pub async fn until<D: PageDriver + ?Sized>(
        &self,
        driver: &D,
        locator: &Locator,
        predicate: Predicate,
    ) -> SondaResult<Waited<Option<ElementHandle>>> {
        locator.validate()?;
        let description = format!("{locator} to be {predicate}");
        self.poll(&description, move || async move {
            let Some(found) = locator.find(driver, None).await? else {
                return Ok(predicate.holds(None).then_some(None));
            };
            let state = driver.inspect(&found.handle).await?;
            Ok(predicate
                .holds(state.as_ref())
                .then_some(Some(found.handle)))
        })
        .await
    }

    /// Wait for an element predicate and return the element
    pub async fn element<D: PageDriver + ?Sized>(
        &self,
        driver: &D,
        locator: &Locator,
        predicate: Predicate,
    ) -> SondaResult<Waited<ElementHandle>> {
        if !predicate.needs_element() {
            return Err(SondaError::invalid_state(format!(
                "`{predicate}` does not yield an element"
            )));
        }
        let waited = self.until(driver, locator, predicate).await?;
        let Some(handle) = waited.value else {
            return Err(SondaError::NotFound {
                query: locator.to_string(),
            });
        };
        Ok(Waited {
            value: handle,
            elapsed: waited.elapsed,
            waited_for: waited.waited_for,
            polls: waited.polls,
        })
    }

    /// Wait until the element is hidden or removed
    pub async fn gone<D: PageDriver + ?Sized>(
        &self,
        driver: &D,
        locator: &Locator,
    ) -> SondaResult<Waited<Option<ElementHandle>>> {
        self.until(driver, locator, Predicate::InvisibleOrAbsent).await
    }

    /// Wait until the rendered text of the element satisfies `check`
    pub async fn text<D, C>(
        &self,
        driver: &D,
        locator: &Locator,
        condition: &str,
        check: C,
    ) -> SondaResult<Waited<String>>
    where
        D: PageDriver + ?Sized,
        C: Fn(&str) -> bool,
    {
        locator.validate()?;
        let description = format!("text of {locator} to {condition}");
        let check = &check;
        self.poll(&description, move || async move {
            let found = locator.locate(driver, None).await?;
            let text = driver
                .inspect(&found.handle)
                .await?
                .map(|s| s.text)
                .ok_or_else(|| SondaError::StaleElement {
                    handle: found.handle.id.clone(),
                })?;
            Ok(check(&text).then_some(text))
        })
        .await
    }

    /// Wait for a native dialog to open
    pub async fn dialog<D: PageDriver + ?Sized>(&self, driver: &D) -> SondaResult<Waited<Dialog>> {
        self.poll("a native dialog to be present", move || async move {
            driver.pending_dialog().await
        })
        .await
    }
}
