// ── Scanner facade ──
//
// Full lifecycle management for one camera scanner instance. Handles
// device enumeration, permission negotiation, the polling scan loop,
// capability toggles, and the session-less image fallback path.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::Utc;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use optiscan_platform::{CameraDevice, DeviceId, NoticeLevel, PlatformHandles};

use crate::config::{DeviceProfile, ScannerConfig};
use crate::constraints::build_constraints;
use crate::devices::pick_default;
use crate::error::ScanError;
use crate::session::CaptureSession;
use crate::state::{ScanPhase, ScannerState, StateCell, StateWatchStream};

const DETECTION_CHANNEL_SIZE: usize = 16;

/// Vibration pattern played on a successful detection (mobile profile only).
const DETECTION_PATTERN: [Duration; 3] = [
    Duration::from_millis(200),
    Duration::from_millis(100),
    Duration::from_millis(200),
];

// ── Detections ───────────────────────────────────────────────────────

/// Where a decoded payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionSource {
    /// The live capture stream.
    Stream,
    /// A caller-supplied static image.
    Image,
}

/// A successfully decoded payload.
///
/// Transient: handed to the callback and broadcast subscribers, never
/// retained by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub text: String,
    pub source: DetectionSource,
}

type ScanCallback = Box<dyn Fn(&Detection) + Send + Sync>;

// ── Scanner ──────────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ScannerInner>`. Manages the full scan
/// lifecycle: enumeration, permission negotiation, the polling loop,
/// capability toggles, and resource release on every exit path.
#[derive(Clone)]
pub struct Scanner {
    inner: Arc<ScannerInner>,
}

struct ScannerInner {
    config: ScannerConfig,
    handles: PlatformHandles,
    state: StateCell,
    /// Canonical device list; read-only between explicit re-enumerations.
    devices: ArcSwap<Vec<CameraDevice>>,
    enumerated: AtomicBool,
    /// The exclusively-owned capture session, present only while scanning.
    session: Mutex<Option<CaptureSession>>,
    /// Token for an acquisition in progress, cancelled by `stop()`.
    acquire_cancel: Mutex<Option<CancellationToken>>,
    detections: broadcast::Sender<Detection>,
    on_scan: ScanCallback,
}

impl Scanner {
    /// Create a scanner from configuration and host collaborators.
    ///
    /// Does NOT touch hardware -- call [`start()`](Self::start) to
    /// enumerate, negotiate access, and begin polling.
    pub fn new(
        config: ScannerConfig,
        handles: PlatformHandles,
        on_scan: impl Fn(&Detection) + Send + Sync + 'static,
    ) -> Self {
        let initial = ScannerState {
            mobile_profile: config.profile.is_mobile(),
            ..ScannerState::default()
        };
        let (detections, _) = broadcast::channel(DETECTION_CHANNEL_SIZE);

        Self {
            inner: Arc::new(ScannerInner {
                config,
                handles,
                state: StateCell::new(initial),
                devices: ArcSwap::from_pointee(Vec::new()),
                enumerated: AtomicBool::new(false),
                session: Mutex::new(None),
                acquire_cancel: Mutex::new(None),
                detections,
                on_scan: Box::new(on_scan),
            }),
        }
    }

    /// Access the scanner configuration.
    pub fn config(&self) -> &ScannerConfig {
        &self.inner.config
    }

    // ── State observation ────────────────────────────────────────────

    /// Point-in-time state snapshot.
    pub fn state(&self) -> Arc<ScannerState> {
        self.inner.state.snapshot()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ScannerState>> {
        self.inner.state.subscribe()
    }

    /// State changes as a `Stream` for use with `StreamExt` combinators.
    pub fn state_stream(&self) -> StateWatchStream {
        StateWatchStream::new(self.inner.state.subscribe())
    }

    /// Subscribe to the detection broadcast stream.
    pub fn detections(&self) -> broadcast::Receiver<Detection> {
        self.inner.detections.subscribe()
    }

    /// The enumerated device list (empty before the first enumeration).
    pub fn available_cameras(&self) -> Arc<Vec<CameraDevice>> {
        self.inner.devices.load_full()
    }

    /// Whether a flash toggle could ever succeed in this configuration.
    pub fn can_toggle_flash(&self) -> bool {
        self.inner.config.enable_flash && !self.inner.devices.load().is_empty()
    }

    /// Whether a camera switch could ever succeed in this configuration.
    pub fn can_switch_camera(&self) -> bool {
        self.inner.config.enable_camera_switch && self.inner.devices.load().len() > 1
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start scanning: enumerate (first run only), negotiate hardware
    /// access, and begin the polling loop.
    ///
    /// A no-op returning `Ok(())` while a scan is already active -- no
    /// second session is created and no attempt is queued.
    pub async fn start(&self) -> Result<(), ScanError> {
        if !self.inner.state.try_begin() {
            debug!("start ignored: scan already active");
            return Ok(());
        }

        if let Err(err) = self.inner.ensure_enumerated().await {
            self.inner.fail(&err).await;
            return Err(err);
        }

        let attempt = CancellationToken::new();
        *self.inner.acquire_cancel.lock().await = Some(attempt.clone());
        let outcome = self.inner.negotiate(&attempt).await;
        *self.inner.acquire_cancel.lock().await = None;

        match outcome {
            Ok(Some(session)) => {
                if attempt.is_cancelled() {
                    // stop() raced the tail of the negotiation
                    let mut session = session;
                    session.release();
                    self.inner.reset_to_idle();
                    return Ok(());
                }
                self.install_session(session).await;
                info!("scanning started");
                Ok(())
            }
            Ok(None) => {
                // acquisition cancelled by stop()
                self.inner.reset_to_idle();
                Ok(())
            }
            Err(err) => {
                self.inner.fail(&err).await;
                Err(err)
            }
        }
    }

    /// Stop scanning and release the session. Valid from any state and
    /// idempotent; always results in *Idle* with no hardware held.
    pub async fn stop(&self) {
        if let Some(attempt) = self.inner.acquire_cancel.lock().await.take() {
            attempt.cancel();
        }

        let taken = self.inner.session.lock().await.take();
        if let Some(session) = taken {
            debug!(session = %session.id(), "stopping scan");
            session.shutdown().await;
        }
        self.inner.reset_to_idle();
    }

    /// Clear the last error and re-enter the permission path from scratch.
    pub async fn retry(&self) -> Result<(), ScanError> {
        self.inner.state.update(|s| {
            if s.phase == ScanPhase::Error {
                s.phase = ScanPhase::Idle;
            }
            s.error = None;
        });
        self.start().await
    }

    /// Re-evaluate the device profile (e.g. on viewport or orientation
    /// change). Does not re-enumerate devices or disturb an active session.
    pub fn set_profile(&self, profile: DeviceProfile) {
        let mobile = profile.is_mobile();
        self.inner.state.update(|s| s.mobile_profile = mobile);
        debug!(profile = %profile, "device profile updated");
    }

    /// Explicitly re-enumerate devices. Keeps the current selection when
    /// it survives the refresh, otherwise proposes a new default.
    pub async fn refresh_devices(&self) -> Result<Arc<Vec<CameraDevice>>, ScanError> {
        self.inner.refresh_devices().await
    }

    // ── Capabilities ─────────────────────────────────────────────────

    /// Toggle the torch on the active track.
    ///
    /// Returns the new flash state. Fails with
    /// [`ScanError::FlashUnsupported`] when the track has not negotiated
    /// the torch capability, leaving state untouched.
    pub async fn toggle_flash(&self) -> Result<bool, ScanError> {
        if !self.inner.config.enable_flash {
            return Err(ScanError::FlashUnsupported);
        }

        let guard = self.inner.session.lock().await;
        let session = guard.as_ref().ok_or(ScanError::NotScanning)?;
        let track = session.primary_track().ok_or(ScanError::FlashUnsupported)?;
        if !track.capabilities().torch {
            return Err(ScanError::FlashUnsupported);
        }

        let enabled = !self.inner.state.snapshot().flash_enabled;
        track.set_torch(enabled).await.map_err(ScanError::from)?;
        drop(guard);

        self.inner.state.update(|s| s.flash_enabled = enabled);
        self.inner.handles.notifier.notify(
            NoticeLevel::Info,
            if enabled { "Flash on" } else { "Flash off" },
        );
        debug!(enabled, "torch toggled");
        Ok(enabled)
    }

    /// Cycle to the next enumerated camera in round-robin order.
    ///
    /// Fails with [`ScanError::OnlyOneCameraAvailable`] when there is
    /// nothing to cycle to, leaving the selection unchanged. When a scan
    /// is active, the current session is fully torn down and scanning
    /// restarts against the new device after a short settle delay.
    pub async fn switch_camera(&self) -> Result<DeviceId, ScanError> {
        if !self.inner.config.enable_camera_switch {
            return Err(ScanError::OnlyOneCameraAvailable);
        }
        let devices = self.inner.devices.load_full();
        if devices.len() <= 1 {
            return Err(ScanError::OnlyOneCameraAvailable);
        }

        let was_scanning = self.inner.state.snapshot().is_scanning();
        let selected = self.inner.state.snapshot().selected_camera.clone();
        let current = selected
            .as_ref()
            .and_then(|id| devices.iter().position(|d| &d.id == id))
            .unwrap_or(0);
        let Some(next) = devices.get((current + 1) % devices.len()).cloned() else {
            return Err(ScanError::OnlyOneCameraAvailable);
        };

        self.inner
            .state
            .update(|s| s.selected_camera = Some(next.id.clone()));

        let label = if next.label.is_empty() {
            next.id.to_string()
        } else {
            next.label.clone()
        };
        self.inner
            .handles
            .notifier
            .notify(NoticeLevel::Info, &format!("Switching to {label}"));
        info!(device = %next.id, "camera selection advanced");

        if was_scanning {
            self.stop().await;
            // let the hardware settle before re-acquiring
            tokio::time::sleep(self.inner.config.switch_settle).await;
            self.start().await?;
        }

        Ok(next.id)
    }

    // ── Image fallback path ──────────────────────────────────────────

    /// Decode a code from a static image file, independent of any
    /// capture session.
    ///
    /// Resolves to `Ok(true)` and invokes the callback exactly once when
    /// a code is found, `Ok(false)` when the image contains no code, and
    /// `Err` when the image cannot be read or the backend fails. The
    /// loaded image buffer is released on every outcome.
    pub async fn process_image_file(&self, path: impl AsRef<Path>) -> Result<bool, ScanError> {
        let path = path.as_ref();
        self.inner.state.update(|s| s.processing_image = true);
        debug!(path = %path.display(), "processing image file");

        let outcome = self.inner.decode_image_at(path).await;
        self.inner.state.update(|s| s.processing_image = false);

        match outcome {
            Ok(Some(text)) => {
                self.inner
                    .state
                    .update(|s| s.last_detection = Some(Utc::now()));
                self.inner
                    .handles
                    .notifier
                    .notify(NoticeLevel::Success, "Code detected in image");
                let detection = Detection {
                    text,
                    source: DetectionSource::Image,
                };
                (self.inner.on_scan)(&detection);
                let _ = self.inner.detections.send(detection);
                Ok(true)
            }
            Ok(None) => {
                self.inner
                    .handles
                    .notifier
                    .notify(NoticeLevel::Error, &ScanError::NoCodeFound.to_string());
                Ok(false)
            }
            Err(err) => {
                warn!(error = %err, "image decode failed");
                self.inner
                    .handles
                    .notifier
                    .notify(NoticeLevel::Error, &err.to_string());
                Err(err)
            }
        }
    }

    /// Install a negotiated session and spawn its scan loop.
    async fn install_session(&self, session: CaptureSession) {
        let loop_cancel = session.cancel_token().child_token();
        let session_id = session.id();

        let mut slot = self.inner.session.lock().await;
        *slot = Some(session);
        let handle = tokio::spawn(scan_loop(
            Arc::clone(&self.inner),
            loop_cancel,
            session_id,
        ));
        if let Some(active) = slot.as_mut() {
            active.attach_loop(handle);
        }
        drop(slot);

        self.inner.state.update(|s| {
            s.phase = ScanPhase::Scanning;
            s.has_permission = Some(true);
        });
    }
}

// ── Inner implementation ─────────────────────────────────────────────

impl ScannerInner {
    async fn ensure_enumerated(&self) -> Result<(), ScanError> {
        if self.enumerated.load(Ordering::Acquire) {
            return Ok(());
        }
        self.refresh_devices().await.map(|_| ())
    }

    async fn refresh_devices(&self) -> Result<Arc<Vec<CameraDevice>>, ScanError> {
        let devices = self
            .handles
            .camera
            .enumerate()
            .await
            .map_err(ScanError::from)?;
        let default = pick_default(&devices).map(|d| d.id.clone());
        let devices = Arc::new(devices);

        self.devices.store(Arc::clone(&devices));
        self.enumerated.store(true, Ordering::Release);
        debug!(camera_count = devices.len(), "device enumeration complete");

        let snapshot = Arc::clone(&devices);
        self.state.update(move |s| {
            let keep = s
                .selected_camera
                .as_ref()
                .is_some_and(|id| snapshot.iter().any(|d| &d.id == id));
            if !keep {
                s.selected_camera = default;
            }
            s.available_cameras = snapshot;
        });

        Ok(devices)
    }

    /// Acquire a stream under the current constraint profile, bind the
    /// sink, and wait for stream metadata.
    ///
    /// `Ok(None)` means the attempt was cancelled by `stop()`. Every
    /// failure path releases whatever was already acquired.
    async fn negotiate(
        &self,
        attempt: &CancellationToken,
    ) -> Result<Option<CaptureSession>, ScanError> {
        let state = self.state.snapshot();
        let profile = if state.mobile_profile {
            DeviceProfile::Mobile
        } else {
            DeviceProfile::Desktop
        };
        let constraints = build_constraints(
            profile,
            state.selected_camera.as_ref(),
            self.config.preferred_facing,
        );
        debug!(profile = %profile, "requesting camera access");

        let stream = self
            .handles
            .camera
            .open_stream(&constraints)
            .await
            .map_err(ScanError::from)?;
        let mut session = CaptureSession::new(stream, Arc::clone(&self.handles.sink));

        if attempt.is_cancelled() {
            session.release();
            return Ok(None);
        }

        let timeout_secs = self.config.metadata_timeout.as_secs();
        tokio::select! {
            biased;
            () = attempt.cancelled() => {
                session.release();
                Ok(None)
            }
            metadata = tokio::time::timeout(
                self.config.metadata_timeout,
                self.handles.sink.wait_for_metadata(),
            ) => match metadata {
                Ok(Ok(dims)) => {
                    debug!(
                        session = %session.id(),
                        width = dims.width,
                        height = dims.height,
                        "stream metadata ready"
                    );
                    Ok(Some(session))
                }
                Ok(Err(err)) => {
                    session.release();
                    Err(err.into())
                }
                Err(_) => {
                    session.release();
                    Err(ScanError::InitializationTimeout { timeout_secs })
                }
            }
        }
    }

    /// Handle a live-stream hit: mark processing, fire feedback and the
    /// callback, hold the cooldown, then auto-stop.
    async fn complete_detection(&self, text: String, cancel: &CancellationToken) {
        info!("code detected");
        self.state.update(|s| {
            s.phase = ScanPhase::Processing;
            s.last_detection = Some(Utc::now());
        });

        if self.state.snapshot().mobile_profile {
            self.handles.haptics.vibrate(&DETECTION_PATTERN);
        }
        self.handles
            .notifier
            .notify(NoticeLevel::Success, "Code detected");

        let detection = Detection {
            text,
            source: DetectionSource::Stream,
        };
        (self.on_scan)(&detection);
        let _ = self.detections.send(detection);

        // cooldown before auto-stop; an explicit stop() during the
        // cooldown owns the teardown instead
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(self.config.cooldown) => {}
        }

        self.release_session().await;
        self.reset_to_idle();
    }

    async fn release_session(&self) {
        if let Some(mut session) = self.session.lock().await.take() {
            session.release();
        }
    }

    fn reset_to_idle(&self) {
        self.state.update(|s| {
            s.phase = ScanPhase::Idle;
            s.flash_enabled = false;
            s.has_permission = None;
        });
    }

    /// Force the error state: release any held session, record the
    /// user-facing message, and emit an error notice.
    async fn fail(&self, err: &ScanError) {
        self.release_session().await;

        let negotiation_failure = matches!(
            err,
            ScanError::PermissionDenied
                | ScanError::DeviceNotFound
                | ScanError::DeviceBusy
                | ScanError::UnsupportedConstraints
                | ScanError::InitializationTimeout { .. }
        );
        let message = err.to_string();
        warn!(error = %err, "scan attempt failed");

        self.state.update(|s| {
            s.phase = ScanPhase::Error;
            s.error = Some(message.clone());
            s.flash_enabled = false;
            if negotiation_failure {
                s.has_permission = Some(false);
            }
        });
        self.handles.notifier.notify(NoticeLevel::Error, &message);
    }

    async fn decode_image_at(&self, path: &Path) -> Result<Option<String>, ScanError> {
        let image = tokio::fs::read(path)
            .await
            .map_err(|e| ScanError::ImageUnreadable {
                reason: e.to_string(),
            })?;
        let decoded = self
            .handles
            .decoder
            .decode_image(&image)
            .await
            .map_err(ScanError::from)?;
        // the image buffer is dropped here on every outcome
        Ok(decoded)
    }
}

// ── Scan loop ────────────────────────────────────────────────────────

/// The cancellable polling loop, bound one-to-one to its session.
///
/// One decode attempt per tick while nothing is processing. "No code in
/// this frame" is a normal empty tick; backend failures are logged and
/// tolerated as transient. The next tick is never scheduled once
/// cancellation has been requested, and an attempt already in flight
/// completes before the loop exits.
async fn scan_loop(inner: Arc<ScannerInner>, cancel: CancellationToken, session_id: Uuid) {
    let mut ticker = tokio::time::interval(inner.config.scan_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!(session = %session_id, "scan loop started");

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if inner.state.snapshot().is_processing() {
                    continue;
                }
                match inner
                    .handles
                    .decoder
                    .decode_frame(inner.handles.sink.as_ref())
                    .await
                {
                    Ok(Some(text)) => {
                        inner.complete_detection(text, &cancel).await;
                        break;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        // camera focus/exposure noise; keep polling
                        debug!(session = %session_id, error = %err, "decode attempt failed");
                    }
                }
            }
        }
    }

    debug!(session = %session_id, "scan loop ended");
}
