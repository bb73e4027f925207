// ── Fake platform implementations ──
//
// In-tree test doubles for every collaborator trait. Scripted outcomes
// plus call recording, so engine tests can assert on hardware effects
// (tracks stopped, sink cleared, constraints used) without devices.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::camera::{
    CameraDevice, CameraPlatform, CameraStream, FrameDimensions, StreamConstraints,
    TrackCapabilities, VideoSink, VideoTrack,
};
use crate::decode::DecodeBackend;
use crate::error::Error;
use crate::haptics::HapticFeedback;
use crate::notify::{NoticeLevel, Notifier};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().expect("fake state lock poisoned")
}

// ── Camera ──────────────────────────────────────────────────────────

/// Scripted failure for the next acquisition or enumeration call.
#[derive(Debug, Clone)]
pub enum FakeFailure {
    PermissionDenied,
    DeviceNotFound,
    DeviceBusy,
    UnsupportedConstraints,
    EnumerationUnsupported,
    Unknown(String),
}

impl From<FakeFailure> for Error {
    fn from(failure: FakeFailure) -> Self {
        match failure {
            FakeFailure::PermissionDenied => Error::PermissionDenied {
                message: "denied by fake".into(),
            },
            FakeFailure::DeviceNotFound => Error::DeviceNotFound,
            FakeFailure::DeviceBusy => Error::DeviceBusy {
                message: "held by fake".into(),
            },
            FakeFailure::UnsupportedConstraints => Error::UnsupportedConstraints {
                message: "rejected by fake".into(),
            },
            FakeFailure::EnumerationUnsupported => Error::EnumerationUnsupported,
            FakeFailure::Unknown(message) => Error::Unknown { message },
        }
    }
}

/// Fake camera stack: enumerates a scripted device list and vends
/// [`FakeStream`]s whose tracks the test keeps handles to.
pub struct FakeCamera {
    pub devices: Mutex<Vec<CameraDevice>>,
    /// One-shot failure consumed by the next `enumerate` call.
    pub enumerate_failure: Mutex<Option<FakeFailure>>,
    /// One-shot failure consumed by the next `open_stream` call.
    pub open_failure: Mutex<Option<FakeFailure>>,
    /// Whether vended tracks negotiate the torch capability.
    pub torch_capable: AtomicBool,
    /// Number of tracks per vended stream.
    pub tracks_per_stream: AtomicU64,
    pub open_calls: AtomicU64,
    pub recorded_constraints: Mutex<Vec<StreamConstraints>>,
    pub streams: Mutex<Vec<Arc<FakeStream>>>,
}

impl Default for FakeCamera {
    fn default() -> Self {
        Self {
            devices: Mutex::new(Vec::new()),
            enumerate_failure: Mutex::new(None),
            open_failure: Mutex::new(None),
            torch_capable: AtomicBool::new(false),
            tracks_per_stream: AtomicU64::new(1),
            open_calls: AtomicU64::new(0),
            recorded_constraints: Mutex::new(Vec::new()),
            streams: Mutex::new(Vec::new()),
        }
    }
}

impl FakeCamera {
    pub fn with_devices(devices: Vec<CameraDevice>) -> Self {
        let camera = Self::default();
        *locked(&camera.devices) = devices;
        camera
    }

    pub fn fail_next_open(&self, failure: FakeFailure) {
        *locked(&self.open_failure) = Some(failure);
    }

    pub fn fail_next_enumerate(&self, failure: FakeFailure) {
        *locked(&self.enumerate_failure) = Some(failure);
    }

    pub fn open_count(&self) -> u64 {
        self.open_calls.load(Ordering::Relaxed)
    }

    /// Constraints recorded for the nth `open_stream` call.
    pub fn constraints_for_call(&self, index: usize) -> Option<StreamConstraints> {
        locked(&self.recorded_constraints).get(index).cloned()
    }

    /// All tracks ever vended, across every stream.
    pub fn all_tracks(&self) -> Vec<Arc<FakeTrack>> {
        locked(&self.streams)
            .iter()
            .flat_map(|s| s.tracks.iter().cloned())
            .collect()
    }
}

#[async_trait]
impl CameraPlatform for FakeCamera {
    async fn enumerate(&self) -> Result<Vec<CameraDevice>, Error> {
        if let Some(failure) = locked(&self.enumerate_failure).take() {
            return Err(failure.into());
        }
        Ok(locked(&self.devices).clone())
    }

    async fn open_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn CameraStream>, Error> {
        self.open_calls.fetch_add(1, Ordering::Relaxed);
        locked(&self.recorded_constraints).push(constraints.clone());

        if let Some(failure) = locked(&self.open_failure).take() {
            return Err(failure.into());
        }

        let track_count =
            usize::try_from(self.tracks_per_stream.load(Ordering::Relaxed)).unwrap_or(1);
        let torch = self.torch_capable.load(Ordering::Relaxed);
        let tracks = (0..track_count.max(1))
            .map(|_| Arc::new(FakeTrack::new(torch)))
            .collect();

        let stream = Arc::new(FakeStream { tracks });
        locked(&self.streams).push(Arc::clone(&stream));
        Ok(Box::new(stream))
    }
}

/// A vended stream whose tracks remain observable by the test.
pub struct FakeStream {
    pub tracks: Vec<Arc<FakeTrack>>,
}

impl CameraStream for Arc<FakeStream> {
    fn tracks(&self) -> Vec<Arc<dyn VideoTrack>> {
        self.tracks
            .iter()
            .map(|t| Arc::clone(t) as Arc<dyn VideoTrack>)
            .collect()
    }
}

/// A single fake media track.
pub struct FakeTrack {
    torch_capable: bool,
    pub torch_on: AtomicBool,
    pub stopped: AtomicBool,
    pub torch_rejected: AtomicBool,
}

impl FakeTrack {
    pub fn new(torch_capable: bool) -> Self {
        Self {
            torch_capable,
            torch_on: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            torch_rejected: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl VideoTrack for FakeTrack {
    fn capabilities(&self) -> TrackCapabilities {
        TrackCapabilities {
            torch: self.torch_capable,
        }
    }

    async fn set_torch(&self, enabled: bool) -> Result<(), Error> {
        if self.torch_rejected.load(Ordering::Relaxed) || !self.torch_capable {
            return Err(Error::TrackConstraint {
                message: "torch not negotiated".into(),
            });
        }
        self.torch_on.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}

// ── Sink ────────────────────────────────────────────────────────────

/// Fake video sink with scriptable metadata arrival.
pub struct FakeSink {
    pub attached: AtomicBool,
    /// When set, `wait_for_metadata` pends forever (metadata never arrives).
    pub metadata_never_arrives: AtomicBool,
    pub dimensions: Mutex<FrameDimensions>,
    pub attach_calls: AtomicU64,
    pub detach_calls: AtomicU64,
}

impl Default for FakeSink {
    fn default() -> Self {
        Self {
            attached: AtomicBool::new(false),
            metadata_never_arrives: AtomicBool::new(false),
            dimensions: Mutex::new(FrameDimensions {
                width: 1280,
                height: 720,
            }),
            attach_calls: AtomicU64::new(0),
            detach_calls: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl VideoSink for FakeSink {
    fn attach(&self, _stream: &dyn CameraStream) {
        self.attach_calls.fetch_add(1, Ordering::Relaxed);
        self.attached.store(true, Ordering::Relaxed);
    }

    fn detach(&self) {
        self.detach_calls.fetch_add(1, Ordering::Relaxed);
        self.attached.store(false, Ordering::Relaxed);
    }

    fn has_source(&self) -> bool {
        self.attached.load(Ordering::Relaxed)
    }

    fn dimensions(&self) -> Option<FrameDimensions> {
        if self.attached.load(Ordering::Relaxed) {
            Some(*locked(&self.dimensions))
        } else {
            None
        }
    }

    async fn wait_for_metadata(&self) -> Result<FrameDimensions, Error> {
        if self.metadata_never_arrives.load(Ordering::Relaxed) {
            std::future::pending::<()>().await;
        }
        Ok(*locked(&self.dimensions))
    }
}

// ── Decoder ─────────────────────────────────────────────────────────

/// Scripted outcome for one live-frame decode attempt.
#[derive(Debug, Clone)]
pub enum FramePlan {
    /// No code present in this frame (a normal empty tick).
    Empty,
    /// A code was detected.
    Hit(String),
    /// The backend failed on this frame.
    Fail(String),
}

/// Fake decode backend driven by a per-tick script.
///
/// An exhausted script decodes as `Empty` forever.
pub struct FakeDecoder {
    pub frame_plan: Mutex<VecDeque<FramePlan>>,
    pub frame_calls: AtomicU64,
    pub image_codes: Mutex<HashMap<Vec<u8>, String>>,
    pub image_failure: AtomicBool,
}

impl Default for FakeDecoder {
    fn default() -> Self {
        Self {
            frame_plan: Mutex::new(VecDeque::new()),
            frame_calls: AtomicU64::new(0),
            image_codes: Mutex::new(HashMap::new()),
            image_failure: AtomicBool::new(false),
        }
    }
}

impl FakeDecoder {
    pub fn push_empty_frames(&self, count: usize) {
        let mut plan = locked(&self.frame_plan);
        for _ in 0..count {
            plan.push_back(FramePlan::Empty);
        }
    }

    pub fn push_hit(&self, text: impl Into<String>) {
        locked(&self.frame_plan).push_back(FramePlan::Hit(text.into()));
    }

    pub fn push_failure(&self, message: impl Into<String>) {
        locked(&self.frame_plan).push_back(FramePlan::Fail(message.into()));
    }

    /// Register the payload decoded from an exact image byte sequence.
    pub fn register_image(&self, image: impl Into<Vec<u8>>, text: impl Into<String>) {
        locked(&self.image_codes).insert(image.into(), text.into());
    }

    pub fn frame_attempts(&self) -> u64 {
        self.frame_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DecodeBackend for FakeDecoder {
    async fn decode_frame(&self, _sink: &dyn VideoSink) -> Result<Option<String>, Error> {
        self.frame_calls.fetch_add(1, Ordering::Relaxed);
        match locked(&self.frame_plan).pop_front() {
            None | Some(FramePlan::Empty) => Ok(None),
            Some(FramePlan::Hit(text)) => Ok(Some(text)),
            Some(FramePlan::Fail(message)) => Err(Error::Decode { message }),
        }
    }

    async fn decode_image(&self, image: &[u8]) -> Result<Option<String>, Error> {
        if self.image_failure.load(Ordering::Relaxed) {
            return Err(Error::Decode {
                message: "image decode failed".into(),
            });
        }
        Ok(locked(&self.image_codes).get(image).cloned())
    }
}

// ── Haptics / notifier ──────────────────────────────────────────────

/// Records every vibration pattern it receives.
#[derive(Default)]
pub struct FakeHaptics {
    pub patterns: Mutex<Vec<Vec<Duration>>>,
}

impl FakeHaptics {
    pub fn pattern_count(&self) -> usize {
        locked(&self.patterns).len()
    }

    pub fn last_pattern(&self) -> Option<Vec<Duration>> {
        locked(&self.patterns).last().cloned()
    }
}

impl HapticFeedback for FakeHaptics {
    fn vibrate(&self, pattern: &[Duration]) {
        locked(&self.patterns).push(pattern.to_vec());
    }
}

/// Records every notification intent it receives.
#[derive(Default)]
pub struct FakeNotifier {
    pub notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl FakeNotifier {
    pub fn messages_at(&self, level: NoticeLevel) -> Vec<String> {
        locked(&self.notices)
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl Notifier for FakeNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        locked(&self.notices).push((level, message.to_owned()));
    }
}
