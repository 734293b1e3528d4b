//! Sonda: condition-synchronized end-to-end CRUD verification
//!
//! Sonda drives a web application through the full lifecycle of a record
//! (create, verify, edit, verify, delete, verify) and reports a single
//! pass/fail verdict per record kind.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      SONDA Architecture                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Suite      │    │ Scenario   │    │ Session    │            │
//! │   │ (per kind) │───►│ (11 steps) │───►│ (actions)  │            │
//! │   └────────────┘    └────────────┘    └─────┬──────┘            │
//! │                                             │                   │
//! │   ┌────────────┐    ┌────────────┐    ┌─────▼──────┐            │
//! │   │ Assertions │◄───│ Wait       │◄───│ PageDriver │            │
//! │   │ (Verdict)  │    │ Engine     │    │ cdp/memory │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every action is preceded by a bounded wait on an observable condition.
//! Fixed delays exist only as optional presentation pacing.
//!
//! ```
//! use sonda::{Locator, Selector};
//!
//! let delete = Locator::new(Selector::row(["João Teste Selenium"]).within(Selector::button("Excluir")))
//!     .or_unique(Selector::button("Excluir"));
//! assert_eq!(delete.queries().count(), 2);
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

mod assertion;
mod browser;
mod config;
mod dialog;
mod driver;
mod harness;
mod locator;
mod record;
mod result;
mod scenario;
mod session;
mod wait;

/// In-memory page and driver
///
/// Deterministic [`PageDriver`] used by unit and integration tests. A
/// [`memory::Behavior`] plays the application: it rebuilds the document on
/// navigation, reacts to clicks and schedules re-renders on tokio time.
pub mod memory;

pub use assertion::{
    assert_text_absent, assert_text_contains, assert_text_superseded, Assertion, CaseMode,
    MatchMode, Verdict,
};
pub use browser::BrowserConfig;
#[cfg(feature = "browser")]
pub use browser::{ChromiumDriver, ChromiumLauncher};
pub use config::{
    HarnessConfig, Pacing, TypingStrategy, PRESENTATION_DELAY_MS, PRESENTATION_PER_CHAR_MS,
};
pub use dialog::{Dialog, DialogAction, DialogHandler, DialogType};
pub use driver::{DriverLauncher, ElementHandle, ElementState, PageDriver};
pub use harness::{ScenarioResult, Suite, SuiteReport};
pub use locator::{Locator, Match, Selector};
pub use record::{
    Bindings, FieldSpec, FieldUpdate, InputKind, RecordKind, TestRecord, DEFAULT_BASE_URL,
    NAV_BUTTON_CLASS, SUBMIT_CSS, SUCCESS_TOKENS,
};
pub use result::{SondaError, SondaResult};
pub use scenario::{Phase, Scenario, Stage, Transition};
pub use session::{run_scoped, Diagnostics, Scoped, Session, SessionTask};
pub use wait::{
    Predicate, WaitOptions, Waited, Waiter, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::assertion::*;
    pub use super::browser::*;
    pub use super::config::*;
    pub use super::dialog::*;
    pub use super::driver::*;
    pub use super::harness::*;
    pub use super::locator::*;
    pub use super::record::*;
    pub use super::result::*;
    pub use super::scenario::*;
    pub use super::session::*;
    pub use super::wait::*;
}
