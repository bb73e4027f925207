// optiscan-platform: typed seams between the scan engine and its host
// (camera hardware, decode backend, haptics, user-facing notices)

pub mod camera;
pub mod decode;
pub mod error;
pub mod fake;
pub mod handles;
pub mod haptics;
pub mod notify;

pub use camera::{
    CameraDevice, CameraPlatform, CameraStream, DeviceId, DeviceSelection, FacingMode,
    FrameDimensions, RangeHint, StreamConstraints, TrackCapabilities, VideoSink, VideoTrack,
};
pub use decode::DecodeBackend;
pub use error::Error;
pub use handles::PlatformHandles;
pub use haptics::HapticFeedback;
pub use notify::{NoticeLevel, Notifier};
