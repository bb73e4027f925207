// ── Engine error types ──
//
// User-facing errors from optiscan-core. These are NOT platform-specific --
// consumers never see raw platform failures directly. The
// `From<optiscan_platform::Error>` impl translates hardware-layer errors
// into domain-appropriate variants, and every Display string is suitable
// for showing to the person holding the camera.

use thiserror::Error;

/// Unified error type for the scan engine.
#[derive(Debug, Error)]
pub enum ScanError {
    // ── Acquisition errors ───────────────────────────────────────────
    #[error("Camera access was denied. Please allow camera access and try again.")]
    PermissionDenied,

    #[error("No camera was found on this device.")]
    DeviceNotFound,

    #[error("The camera is in use by another application.")]
    DeviceBusy,

    #[error("The requested camera settings are not supported by this device.")]
    UnsupportedConstraints,

    #[error("Timed out waiting for the camera to start ({timeout_secs}s).")]
    InitializationTimeout { timeout_secs: u64 },

    // ── Enumeration errors ───────────────────────────────────────────
    #[error("This platform cannot list camera devices.")]
    EnumerationUnsupported,

    // ── Capability errors ────────────────────────────────────────────
    #[error("Flash is not available on this camera.")]
    FlashUnsupported,

    #[error("Only one camera is available.")]
    OnlyOneCameraAvailable,

    #[error("The scanner is not running.")]
    NotScanning,

    // ── Fallback-path errors ─────────────────────────────────────────
    #[error("No code was found in the image.")]
    NoCodeFound,

    #[error("The image could not be read: {reason}")]
    ImageUnreadable { reason: String },

    // ── Platform errors (wrapped, not exposed raw) ───────────────────
    #[error("Camera error: {message}")]
    Platform { message: String },
}

// ── Conversion from platform-layer errors ────────────────────────────

impl From<optiscan_platform::Error> for ScanError {
    fn from(err: optiscan_platform::Error) -> Self {
        match err {
            optiscan_platform::Error::PermissionDenied { .. } => ScanError::PermissionDenied,
            optiscan_platform::Error::DeviceNotFound => ScanError::DeviceNotFound,
            optiscan_platform::Error::DeviceBusy { .. } => ScanError::DeviceBusy,
            optiscan_platform::Error::UnsupportedConstraints { .. } => {
                ScanError::UnsupportedConstraints
            }
            optiscan_platform::Error::EnumerationUnsupported => ScanError::EnumerationUnsupported,
            optiscan_platform::Error::TrackConstraint { .. } => ScanError::FlashUnsupported,
            optiscan_platform::Error::Sink { message }
            | optiscan_platform::Error::Decode { message }
            | optiscan_platform::Error::Unknown { message } => ScanError::Platform { message },
        }
    }
}
