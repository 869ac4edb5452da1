//! Contracts for the user-facing layer.
//!
//! The display layer is out of scope for FITRACK's core; the training service
//! only needs a place to push short messages and a global busy indicator.

use std::time::Duration;

/// Global UI state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    StartLoading,
    StopLoading,
}

/// Dispatch channel for global UI state.
pub trait UiDispatcher: Send + Sync {
    fn dispatch(&self, action: UiAction);
}

/// A transient user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    /// Optional label for a dismiss/undo style action
    pub action: Option<String>,
    /// How long the message stays visible
    pub duration: Duration,
}

/// Sink for transient user-facing messages (toast/snackbar style).
pub trait NotificationSink: Send + Sync {
    fn show(&self, notification: Notification);

    /// Convenience wrapper building a [`Notification`].
    fn show_snackbar(&self, message: &str, action: Option<&str>, duration: Duration) {
        self.show(Notification {
            message: message.to_string(),
            action: action.map(str::to_string),
            duration,
        });
    }
}
