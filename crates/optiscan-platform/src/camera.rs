// ── Camera platform surface ──
//
// Typed descriptors and traits for device enumeration, stream
// acquisition under a constraint profile, per-track capability
// introspection, and stream/track teardown. The engine only ever talks
// to these traits, so tests run it against `fake` implementations
// without real hardware.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Error;

// ── Descriptors ─────────────────────────────────────────────────────

/// Opaque platform identifier for a camera device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which way a camera points when no specific device is pinned.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Toward the user (selfie camera).
    User,
    /// Away from the user (rear camera).
    Environment,
}

/// Read-only snapshot of one enumerated camera.
///
/// Refreshed only on explicit re-enumeration; never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraDevice {
    pub id: DeviceId,
    /// Human-readable label. May be empty before permission is granted,
    /// depending on platform behavior.
    pub label: String,
    /// Facing direction when the platform reports one.
    pub facing: Option<FacingMode>,
}

// ── Constraints ─────────────────────────────────────────────────────

/// An ideal/min/max envelope for one numeric constraint dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeHint {
    pub ideal: Option<u32>,
    pub min: Option<u32>,
    pub max: Option<u32>,
}

/// How to pick the device for an acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceSelection {
    /// Pin to exactly this device.
    Exact(DeviceId),
    /// Let the platform pick any device with this facing.
    Facing(FacingMode),
}

/// Constraint profile handed to [`CameraPlatform::open_stream`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConstraints {
    pub device: DeviceSelection,
    pub width: RangeHint,
    pub height: RangeHint,
    pub frame_rate: RangeHint,
    pub aspect_ratio: Option<f64>,
}

// ── Capabilities / metadata ─────────────────────────────────────────

/// Capabilities negotiated on a live video track.
///
/// An explicit descriptor rather than duck-typed field probing: absent
/// capabilities are `false`, never "missing field".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackCapabilities {
    /// A controllable light source attached to the camera.
    pub torch: bool,
}

/// Frame dimensions reported by the sink once stream metadata arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDimensions {
    pub width: u32,
    pub height: u32,
}

// ── Traits ──────────────────────────────────────────────────────────

/// Entry point to the host's camera stack.
#[async_trait]
pub trait CameraPlatform: Send + Sync {
    /// List available camera devices without requesting hardware access.
    async fn enumerate(&self) -> Result<Vec<CameraDevice>, Error>;

    /// Acquire a live stream under the given constraint profile.
    async fn open_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn CameraStream>, Error>;
}

/// A live hardware stream. Owned exclusively by one capture session.
pub trait CameraStream: Send + Sync {
    /// The media tracks belonging to this stream.
    fn tracks(&self) -> Vec<Arc<dyn VideoTrack>>;
}

/// One media track of a live stream.
#[async_trait]
pub trait VideoTrack: Send + Sync {
    /// Query the negotiated capability set. Cheap; called once per toggle.
    fn capabilities(&self) -> TrackCapabilities;

    /// Apply the torch constraint. Fails with [`Error::TrackConstraint`]
    /// when the track rejects it.
    async fn set_torch(&self, enabled: bool) -> Result<(), Error>;

    /// Stop the track, releasing its slice of the hardware. Idempotent.
    fn stop(&self);

    /// Whether the track has been stopped.
    fn is_stopped(&self) -> bool;
}

/// The video sink a stream is bound to for frame sampling.
#[async_trait]
pub trait VideoSink: Send + Sync {
    /// Bind a stream as the sink's source.
    fn attach(&self, stream: &dyn CameraStream);

    /// Clear the sink's source reference. Idempotent.
    fn detach(&self);

    /// Whether a source is currently bound.
    fn has_source(&self) -> bool;

    /// Frame dimensions, if metadata has arrived.
    fn dimensions(&self) -> Option<FrameDimensions>;

    /// Wait until stream metadata (frame dimensions) is available.
    ///
    /// Callers bound this with their own deadline; the sink itself may
    /// pend indefinitely when no metadata ever arrives.
    async fn wait_for_metadata(&self) -> Result<FrameDimensions, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_mode_round_trips_through_strings() {
        assert_eq!(FacingMode::Environment.to_string(), "environment");
        assert_eq!("user".parse::<FacingMode>().ok(), Some(FacingMode::User));
        assert!("sideways".parse::<FacingMode>().is_err());
    }

    #[test]
    fn absent_capabilities_default_to_false() {
        let caps = TrackCapabilities::default();
        assert!(!caps.torch);
    }
}
