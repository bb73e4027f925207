// ── Reactive scanner state ──
//
// One state snapshot per scanner instance, mutated in place through the
// lifecycle state machine. Mutations are broadcast to subscribers via a
// `watch` channel; snapshots are cheap `Arc` clones.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use futures_core::Stream;
use optiscan_platform::{CameraDevice, DeviceId};
use serde::Serialize;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// Lifecycle phase of the live-scan state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ScanPhase {
    #[default]
    Idle,
    RequestingPermission,
    Scanning,
    Processing,
    Error,
}

/// Read-only state snapshot observable by consumers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScannerState {
    pub phase: ScanPhase,
    /// Busy flag for the session-less image fallback path.
    pub processing_image: bool,
    /// User-facing message for the last surfaced failure.
    pub error: Option<String>,
    /// `None` until a negotiation attempt settles the question.
    pub has_permission: Option<bool>,
    pub mobile_profile: bool,
    /// True only while the active track has the torch applied.
    pub flash_enabled: bool,
    /// Enumerated devices; read-only between explicit re-enumerations.
    pub available_cameras: Arc<Vec<CameraDevice>>,
    /// Always a member of `available_cameras` when that list is non-empty.
    pub selected_camera: Option<DeviceId>,
    pub last_detection: Option<DateTime<Utc>>,
}

impl ScannerState {
    /// A live scan attempt is underway (negotiating, polling, or cooling down).
    pub fn is_scanning(&self) -> bool {
        matches!(
            self.phase,
            ScanPhase::RequestingPermission | ScanPhase::Scanning | ScanPhase::Processing
        )
    }

    /// A decode attempt is in flight or cooling down; the loop skips ticks.
    pub fn is_processing(&self) -> bool {
        self.processing_image || matches!(self.phase, ScanPhase::Processing)
    }
}

// ── State cell ──────────────────────────────────────────────────────

/// Holder of the canonical state, broadcasting every mutation.
pub(crate) struct StateCell {
    tx: watch::Sender<Arc<ScannerState>>,
}

impl StateCell {
    pub(crate) fn new(initial: ScannerState) -> Self {
        let (tx, _) = watch::channel(Arc::new(initial));
        Self { tx }
    }

    pub(crate) fn snapshot(&self) -> Arc<ScannerState> {
        self.tx.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<ScannerState>> {
        self.tx.subscribe()
    }

    /// Apply a mutation and notify subscribers.
    pub(crate) fn update(&self, mutate: impl FnOnce(&mut ScannerState)) {
        self.tx.send_modify(|current| {
            let mut next = ScannerState::clone(current);
            mutate(&mut next);
            *current = Arc::new(next);
        });
    }

    /// Atomically enter `RequestingPermission` if no scan is underway.
    ///
    /// Returns `false` (leaving state untouched) when a scan is already
    /// active, making a second `start()` a no-op rather than a queued or
    /// concurrent attempt.
    pub(crate) fn try_begin(&self) -> bool {
        let mut began = false;
        self.tx.send_modify(|current| {
            if !current.is_scanning() {
                let mut next = ScannerState::clone(current);
                next.phase = ScanPhase::RequestingPermission;
                next.error = None;
                *current = Arc::new(next);
                began = true;
            }
        });
        began
    }
}

// ── Stream adapter ──────────────────────────────────────────────────

/// `Stream` adapter over the state watch channel.
///
/// Yields a new snapshot each time the state is mutated.
pub struct StateWatchStream {
    inner: WatchStream<Arc<ScannerState>>,
}

impl StateWatchStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<ScannerState>>) -> Self {
        Self {
            inner: WatchStream::new(receiver),
        }
    }
}

impl Stream for StateWatchStream {
    type Item = Arc<ScannerState>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_phase_implies_scanning() {
        let state = ScannerState {
            phase: ScanPhase::Processing,
            ..ScannerState::default()
        };
        assert!(state.is_scanning());
        assert!(state.is_processing());
    }

    #[test]
    fn image_processing_does_not_imply_scanning() {
        let state = ScannerState {
            processing_image: true,
            ..ScannerState::default()
        };
        assert!(!state.is_scanning());
        assert!(state.is_processing());
    }

    #[test]
    fn try_begin_rejects_while_active() {
        let cell = StateCell::new(ScannerState::default());
        assert!(cell.try_begin());
        assert!(!cell.try_begin());
        assert_eq!(cell.snapshot().phase, ScanPhase::RequestingPermission);
    }

    #[test]
    fn updates_reach_subscribers() {
        let cell = StateCell::new(ScannerState::default());
        let mut rx = cell.subscribe();
        cell.update(|s| s.flash_enabled = true);
        assert!(rx.has_changed().unwrap_or(false));
        assert!(rx.borrow_and_update().flash_enabled);
    }
}
