// ── Haptic feedback surface ──

use std::time::Duration;

/// Sink for vibration patterns.
///
/// A pattern alternates vibrate/pause segments, starting with a vibrate.
/// Hosts without a vibration motor implement this as a no-op.
pub trait HapticFeedback: Send + Sync {
    fn vibrate(&self, pattern: &[Duration]);
}
