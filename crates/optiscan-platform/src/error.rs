use thiserror::Error;

/// Top-level error type for the `optiscan-platform` crate.
///
/// Covers every failure mode across the platform surfaces: device
/// enumeration, stream acquisition, track control, sink binding, and the
/// decode backend. `optiscan-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Acquisition ─────────────────────────────────────────────────
    /// Hardware access was refused by the user or platform policy.
    #[error("Camera permission denied: {message}")]
    PermissionDenied { message: String },

    /// No device satisfied the requested selection.
    #[error("No matching camera device found")]
    DeviceNotFound,

    /// The device exists but is held by another consumer.
    #[error("Camera device is busy: {message}")]
    DeviceBusy { message: String },

    /// The constraint profile cannot be satisfied by any device.
    #[error("Unsupported stream constraints: {message}")]
    UnsupportedConstraints { message: String },

    // ── Enumeration ─────────────────────────────────────────────────
    /// The platform has no device-listing capability.
    #[error("Device enumeration is not supported on this platform")]
    EnumerationUnsupported,

    // ── Track / sink ────────────────────────────────────────────────
    /// A constraint application on a live track was rejected.
    #[error("Track constraint rejected: {message}")]
    TrackConstraint { message: String },

    /// The sink failed while producing frame metadata.
    #[error("Video sink error: {message}")]
    Sink { message: String },

    // ── Decode backend ──────────────────────────────────────────────
    /// The decode backend failed outright. Absence of a code is NOT an
    /// error: backends report that as `Ok(None)`.
    #[error("Decode backend error: {message}")]
    Decode { message: String },

    // ── Catch-all ───────────────────────────────────────────────────
    /// Unclassified platform failure.
    #[error("Platform error: {message}")]
    Unknown { message: String },
}

impl Error {
    /// Returns `true` if this is a transient error a polling loop may
    /// tolerate (camera focus/exposure noise, a single bad frame).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::Sink { .. })
    }

    /// Returns `true` if the failure happened while acquiring hardware,
    /// before any stream was handed out.
    pub fn is_acquisition(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. }
                | Self::DeviceNotFound
                | Self::DeviceBusy { .. }
                | Self::UnsupportedConstraints { .. }
        )
    }
}
