//! PageDriver - the seam between the engine and a concrete browser.
//!
//! The locator, wait engine and action primitives only ever talk to a
//! `PageDriver`. Two implementations ship with the crate:
//!
//! - `ChromiumDriver` (feature `browser`) drives Chromium over CDP via chromiumoxide
//! - `MemoryDriver` drives an in-memory document, used by the test suites
//!
//! Handles are opaque. A driver reports a handle whose node was removed or
//! replaced by re-rendering as [`SondaError::StaleElement`].
//!
//! [`SondaError::StaleElement`]: crate::SondaError::StaleElement

use crate::dialog::Dialog;
use crate::locator::Selector;
use crate::result::SondaResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to one node of the live document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Driver-assigned identifier
    pub id: String,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.id)
    }
}

/// Snapshot of an element's observable state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    /// Element and all its ancestors are rendered
    pub displayed: bool,
    /// Element is not disabled
    pub enabled: bool,
    /// Another element covers the element's center point
    pub obscured: bool,
    /// Rendered text
    pub text: String,
    /// Current value for form controls
    pub value: Option<String>,
}

impl ElementState {
    /// Present, visible, enabled and not covered
    #[must_use]
    pub const fn is_clickable(&self) -> bool {
        self.displayed && self.enabled && !self.obscured
    }
}

/// Abstract browser page the engine drives
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Load a URL
    async fn navigate(&mut self, url: &str) -> SondaResult<()>;

    /// Resolve a selector, optionally beneath a scope element, in document order
    async fn query(
        &self,
        selector: &Selector,
        scope: Option<&ElementHandle>,
    ) -> SondaResult<Vec<ElementHandle>>;

    /// Observe an element; `None` when the handle is stale
    async fn inspect(&self, handle: &ElementHandle) -> SondaResult<Option<ElementState>>;

    /// Dispatch a click
    async fn click(&mut self, handle: &ElementHandle) -> SondaResult<()>;

    /// Append text to a form control, emitting input events
    async fn send_keys(&mut self, handle: &ElementHandle, text: &str) -> SondaResult<()>;

    /// Empty a form control
    async fn clear(&mut self, handle: &ElementHandle) -> SondaResult<()>;

    /// Native dialog currently open, if any
    async fn pending_dialog(&self) -> SondaResult<Option<Dialog>>;

    /// Accept or dismiss the open native dialog
    async fn resolve_dialog(&mut self, accept: bool) -> SondaResult<Dialog>;

    /// Current page URL
    async fn current_url(&self) -> SondaResult<String>;

    /// PNG screenshot of the viewport; empty when unsupported
    async fn screenshot(&self) -> SondaResult<Vec<u8>>;

    /// Release the session
    async fn close(&mut self) -> SondaResult<()>;
}

/// Factory for fresh driver sessions
#[async_trait]
pub trait DriverLauncher: Send + Sync {
    /// Driver produced by this launcher
    type Driver: PageDriver;

    /// Acquire a new session
    async fn launch(&self) -> SondaResult<Self::Driver>;
}
