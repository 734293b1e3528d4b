//! Native dialog tracking.
//!
//! Dialogs (alert, confirm, prompt, beforeunload) live outside the document
//! tree. Drivers feed every dialog that opens into a [`DialogHandler`]; the
//! wait engine polls it for the `dialog-present` predicate and the action
//! primitives resolve it.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Type of browser dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogType {
    /// Alert dialog (OK button only)
    Alert,
    /// Confirm dialog (OK/Cancel buttons)
    Confirm,
    /// Prompt dialog (text input + OK/Cancel)
    Prompt,
    /// Before unload dialog (Leave/Stay buttons)
    BeforeUnload,
}

impl std::fmt::Display for DialogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alert => write!(f, "alert"),
            Self::Confirm => write!(f, "confirm"),
            Self::Prompt => write!(f, "prompt"),
            Self::BeforeUnload => write!(f, "beforeunload"),
        }
    }
}

/// How a dialog was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogAction {
    /// Accepted (OK/Yes/Leave)
    Accept,
    /// Dismissed (Cancel/No/Stay)
    Dismiss,
    /// Still open
    Pending,
}

/// A native dialog observed on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialog {
    dialog_type: DialogType,
    message: String,
    default_value: Option<String>,
    action: DialogAction,
}

impl Dialog {
    /// Create a pending dialog
    #[must_use]
    pub fn new(dialog_type: DialogType, message: impl Into<String>) -> Self {
        Self {
            dialog_type,
            message: message.into(),
            default_value: None,
            action: DialogAction::Pending,
        }
    }

    /// Create a confirm dialog
    #[must_use]
    pub fn confirm(message: impl Into<String>) -> Self {
        Self::new(DialogType::Confirm, message)
    }

    /// Create an alert dialog
    #[must_use]
    pub fn alert(message: impl Into<String>) -> Self {
        Self::new(DialogType::Alert, message)
    }

    /// Attach the prompt's default value
    #[must_use]
    pub fn with_default_value(mut self, value: Option<String>) -> Self {
        self.default_value = value;
        self
    }

    /// Get dialog type
    #[must_use]
    pub const fn dialog_type(&self) -> DialogType {
        self.dialog_type
    }

    /// Get dialog message
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get default value (for prompts)
    #[must_use]
    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    /// Get action taken
    #[must_use]
    pub const fn action(&self) -> DialogAction {
        self.action
    }

    /// Check if dialog was handled
    #[must_use]
    pub const fn is_handled(&self) -> bool {
        !matches!(self.action, DialogAction::Pending)
    }
}

/// Shared record of dialogs seen by one page
#[derive(Clone, Default)]
pub struct DialogHandler {
    dialogs: Arc<Mutex<Vec<Dialog>>>,
}

impl DialogHandler {
    /// Create an empty handler
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a dialog that just opened
    pub fn record(&self, dialog: Dialog) {
        tracing::debug!(kind = %dialog.dialog_type(), message = dialog.message(), "dialog opened");
        if let Ok(mut dialogs) = self.dialogs.lock() {
            dialogs.push(dialog);
        }
    }

    /// Oldest dialog still waiting for a resolution
    #[must_use]
    pub fn pending(&self) -> Option<Dialog> {
        self.dialogs
            .lock()
            .ok()
            .and_then(|d| d.iter().find(|dialog| !dialog.is_handled()).cloned())
    }

    /// Mark the pending dialog resolved and return it
    pub fn resolve(&self, accept: bool) -> Option<Dialog> {
        let mut dialogs = self.dialogs.lock().ok()?;
        let dialog = dialogs.iter_mut().find(|dialog| !dialog.is_handled())?;
        dialog.action = if accept {
            DialogAction::Accept
        } else {
            DialogAction::Dismiss
        };
        Some(dialog.clone())
    }

    /// Get all dialogs encountered
    #[must_use]
    pub fn dialogs(&self) -> Vec<Dialog> {
        self.dialogs.lock().map(|d| d.clone()).unwrap_or_default()
    }

    /// Get count of dialogs
    #[must_use]
    pub fn dialog_count(&self) -> usize {
        self.dialogs.lock().map(|d| d.len()).unwrap_or(0)
    }

    /// Check if any dialogs are pending
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending().is_some()
    }

    /// Clear dialog history
    pub fn clear(&self) {
        if let Ok(mut d) = self.dialogs.lock() {
            d.clear();
        }
    }
}

impl std::fmt::Debug for DialogHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogHandler")
            .field("dialog_count", &self.dialog_count())
            .field("has_pending", &self.has_pending())
            .finish()
    }
}
