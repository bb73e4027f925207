// ── User-facing notification surface ──
//
// The engine never renders UI; it emits notification intents and the
// host decides how (or whether) to show them.

/// Severity of a notification intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
    Info,
}

/// Receiver for notification intents.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);
}
