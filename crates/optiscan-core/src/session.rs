// ── Capture session ──
//
// Scoped ownership of one hardware stream and its sink binding.
// Created on successful permission negotiation, destroyed on stop,
// decode success, error, timeout, or camera switch. Exclusively owned:
// no operation can leave a track running without an owning session.

use std::sync::Arc;

use optiscan_platform::{CameraStream, VideoSink, VideoTrack};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

pub(crate) struct CaptureSession {
    id: Uuid,
    /// Owns the live hardware handle for the session's lifetime.
    #[allow(dead_code)]
    stream: Box<dyn CameraStream>,
    tracks: Vec<Arc<dyn VideoTrack>>,
    sink: Arc<dyn VideoSink>,
    cancel: CancellationToken,
    loop_handle: Option<JoinHandle<()>>,
    released: bool,
}

impl CaptureSession {
    /// Take ownership of a freshly acquired stream and bind it to the sink.
    pub(crate) fn new(stream: Box<dyn CameraStream>, sink: Arc<dyn VideoSink>) -> Self {
        let tracks = stream.tracks();
        sink.attach(stream.as_ref());
        Self {
            id: Uuid::new_v4(),
            stream,
            tracks,
            sink,
            cancel: CancellationToken::new(),
            loop_handle: None,
            released: false,
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    /// Token the scan loop derives its child token from. Cancelled on release.
    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn attach_loop(&mut self, handle: JoinHandle<()>) {
        self.loop_handle = Some(handle);
    }

    /// The track used for capability negotiation (torch).
    pub(crate) fn primary_track(&self) -> Option<Arc<dyn VideoTrack>> {
        self.tracks.first().cloned()
    }

    /// Stop every track and clear the sink's source reference. Idempotent.
    ///
    /// Does not wait for the scan loop; callers that need teardown
    /// ordering use [`shutdown`](Self::shutdown).
    pub(crate) fn release(&mut self) {
        if self.released {
            return;
        }
        self.cancel.cancel();
        for track in &self.tracks {
            track.stop();
        }
        self.sink.detach();
        self.released = true;
        debug!(session = %self.id, "capture session released");
    }

    /// Cancel the scan loop, wait for an in-flight attempt to finish,
    /// then release the hardware.
    pub(crate) async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.loop_handle.take() {
            let _ = handle.await;
        }
        self.release();
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if !self.released {
            warn!(session = %self.id, "capture session dropped without release");
            self.release();
        }
    }
}
