//! Single-slot user notifications.
//!
//! There is no queue: every `notify` overwrites the slot, last writer wins.
//! `stop_notify` only closes the slot and leaves message and severity in
//! place so a front end can animate the closing toast.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

/// How long non-sticky notifications stay open.
const AUTO_HIDE_MS: u64 = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Success,
    Warning,
    Error,
    Loading,
}

impl Severity {
    /// Delay before the notification closes itself. Errors and loading
    /// indicators stay until dismissed.
    pub fn auto_hide(self) -> Option<Duration> {
        match self {
            Severity::Error | Severity::Loading => None,
            _ => Some(Duration::from_millis(AUTO_HIDE_MS)),
        }
    }

    /// Severity used for styling; a loading indicator renders as info.
    pub fn alert_severity(self) -> Severity {
        match self {
            Severity::Loading => Severity::Info,
            other => other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Loading => "loading",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Notification {
    pub open: bool,
    pub message: String,
    pub severity: Severity,
    pub raised_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Whether an open notification has outlived its auto-hide delay.
    pub fn should_auto_dismiss(&self, now: DateTime<Utc>) -> bool {
        let (true, Some(hide_after), Some(raised_at)) =
            (self.open, self.severity.auto_hide(), self.raised_at)
        else {
            return false;
        };
        (now - raised_at)
            .to_std()
            .map(|elapsed| elapsed >= hide_after)
            .unwrap_or(false)
    }
}

/// The notification slot. Owned by the application root, shared by `Arc`.
#[derive(Debug)]
pub struct NotificationCenter {
    tx: watch::Sender<Notification>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Notification::default());
        Self { tx }
    }

    pub fn notify(&self, message: impl Into<String>, severity: Severity) {
        let message = message.into();
        debug!(%severity, %message, "Notify");
        self.tx.send_replace(Notification {
            open: true,
            message,
            severity,
            raised_at: Some(Utc::now()),
        });
    }

    pub fn stop_notify(&self) {
        self.tx.send_if_modified(|current| {
            let was_open = current.open;
            current.open = false;
            was_open
        });
    }

    pub fn snapshot(&self) -> Notification {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_hide_by_severity() {
        assert_eq!(Severity::Info.auto_hide(), Some(Duration::from_millis(4000)));
        assert_eq!(Severity::Success.auto_hide(), Some(Duration::from_millis(4000)));
        assert_eq!(Severity::Warning.auto_hide(), Some(Duration::from_millis(4000)));
        assert_eq!(Severity::Error.auto_hide(), None);
        assert_eq!(Severity::Loading.auto_hide(), None);
    }

    #[test]
    fn test_loading_renders_as_info() {
        assert_eq!(Severity::Loading.alert_severity(), Severity::Info);
        assert_eq!(Severity::Error.alert_severity(), Severity::Error);
    }

    #[test]
    fn test_last_writer_wins() {
        let center = NotificationCenter::new();
        assert!(!center.snapshot().open);

        center.notify("Loading draws", Severity::Loading);
        center.notify("Ticket purchased", Severity::Success);

        let current = center.snapshot();
        assert!(current.open);
        assert_eq!(current.message, "Ticket purchased");
        assert_eq!(current.severity, Severity::Success);
    }

    #[test]
    fn test_stop_keeps_stale_content() {
        let center = NotificationCenter::new();
        center.notify("Session expired", Severity::Error);
        center.stop_notify();

        let current = center.snapshot();
        assert!(!current.open);
        assert_eq!(current.message, "Session expired");
        assert_eq!(current.severity, Severity::Error);
    }

    #[test]
    fn test_should_auto_dismiss() {
        let raised_at = Utc::now();
        let mut note = Notification {
            open: true,
            message: "Saved".into(),
            severity: Severity::Success,
            raised_at: Some(raised_at),
        };
        assert!(!note.should_auto_dismiss(raised_at + chrono::Duration::seconds(3)));
        assert!(note.should_auto_dismiss(raised_at + chrono::Duration::seconds(5)));
        assert!(!note.should_auto_dismiss(raised_at - chrono::Duration::seconds(1)));

        note.severity = Severity::Error;
        assert!(!note.should_auto_dismiss(raised_at + chrono::Duration::minutes(10)));

        note.severity = Severity::Info;
        note.open = false;
        assert!(!note.should_auto_dismiss(raised_at + chrono::Duration::minutes(10)));
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let center = NotificationCenter::new();
        let mut rx = center.subscribe();
        center.notify("Hello", Severity::Info);
        rx.changed().await.expect("sender alive");
        assert_eq!(rx.borrow().message, "Hello");
    }
}
