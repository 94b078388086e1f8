//! Fire-and-forget operator feedback.

use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How long a notification stays up unless the caller says otherwise.
pub const DEFAULT_NOTIFY_DURATION: Duration = Duration::from_millis(3000);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn icon(self) -> &'static str {
        match self {
            Severity::Info => "📷",
            Severity::Success => "✅",
            Severity::Warning => "⚠️",
            Severity::Error => "❌",
        }
    }
}

/// User feedback channel. Implementations must not block the caller.
pub trait Notifier {
    fn notify(&self, message: &str, severity: Severity, duration: Duration);
}

/// Routes notifications to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, severity: Severity, _duration: Duration) {
        match severity {
            Severity::Error => log::error!("{}", message),
            Severity::Warning => log::warn!("{}", message),
            Severity::Info | Severity::Success => log::info!("{}", message),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    pub duration: Duration,
}

/// Keeps every notification in memory; clones share the same record.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotifier {
    entries: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Notification> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|n| n.message).collect()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries()
            .iter()
            .filter(|n| n.severity == severity)
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, severity: Severity, duration: Duration) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Notification {
                message: message.to_string(),
                severity,
                duration,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_notifier_shares_entries_across_clones() {
        let notifier = RecordingNotifier::new();
        let handle: Box<dyn Notifier> = Box::new(notifier.clone());

        handle.notify("QR Code scanned!", Severity::Success, Duration::from_millis(2000));
        handle.notify("Invalid QR code", Severity::Error, DEFAULT_NOTIFY_DURATION);

        assert_eq!(notifier.messages(), vec!["QR Code scanned!", "Invalid QR code"]);
        assert_eq!(notifier.count(Severity::Error), 1);
        assert_eq!(notifier.entries()[0].duration, Duration::from_millis(2000));
    }

    #[test]
    fn log_notifier_accepts_every_severity() {
        for severity in [Severity::Info, Severity::Success, Severity::Warning, Severity::Error] {
            LogNotifier.notify("check", severity, DEFAULT_NOTIFY_DURATION);
            assert!(!severity.icon().is_empty());
        }
    }
}
