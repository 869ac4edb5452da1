//! UI state service.
//!
//! Keeps the global loading flag and forwards user-facing notifications to
//! the log and to any attached listener (a terminal frontend, a desktop shell).

use fitrack_core::ui::{Notification, NotificationSink, UiAction, UiDispatcher};
use tokio::sync::{broadcast, watch};

const NOTIFICATION_BUFFER: usize = 16;

/// Holds global UI state and relays notifications.
#[derive(Debug)]
pub struct UiService {
    loading: watch::Sender<bool>,
    notifications: broadcast::Sender<Notification>,
}

impl UiService {
    pub fn new() -> Self {
        let (loading, _) = watch::channel(false);
        let (notifications, _) = broadcast::channel(NOTIFICATION_BUFFER);
        Self {
            loading,
            notifications,
        }
    }

    /// Whether a loading operation is in progress.
    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Observes the loading flag; the receiver always sees the latest value.
    pub fn watch_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    /// Receives notifications shown after this call.
    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }
}

impl Default for UiService {
    fn default() -> Self {
        Self::new()
    }
}

impl UiDispatcher for UiService {
    fn dispatch(&self, action: UiAction) {
        let loading = matches!(action, UiAction::StartLoading);
        tracing::debug!("[UiService] {:?}", action);
        self.loading.send_replace(loading);
    }
}

impl NotificationSink for UiService {
    fn show(&self, notification: Notification) {
        tracing::warn!(
            action = notification.action.as_deref().unwrap_or(""),
            duration_secs = notification.duration.as_secs(),
            "{}",
            notification.message
        );
        // No listener attached is fine; the message was logged
        let _ = self.notifications.send(notification);
    }
}
