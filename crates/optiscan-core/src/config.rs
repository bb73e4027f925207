// ── Runtime scanner configuration ──
//
// These types describe *how* the engine should scan. They carry tuning
// knobs only and never touch disk. The host constructs a `ScannerConfig`
// and hands it in; `optiscan-config` builds one from layered settings.

use std::time::Duration;

use optiscan_platform::FacingMode;
use serde::{Deserialize, Serialize};

/// Device class the engine is running on.
///
/// Drives the constraint envelope requested from the camera and gates
/// haptic feedback. Re-evaluable at runtime (e.g. on viewport or
/// orientation change) via [`Scanner::set_profile`](crate::Scanner::set_profile)
/// without disturbing an active session.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeviceProfile {
    Mobile,
    #[default]
    Desktop,
}

impl DeviceProfile {
    pub fn is_mobile(self) -> bool {
        matches!(self, Self::Mobile)
    }
}

/// Configuration for one scanner instance.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Facing preference used when no specific device is pinned.
    pub preferred_facing: FacingMode,
    /// Cadence of live decode attempts.
    pub scan_interval: Duration,
    /// Hold time after a successful detection before auto-stop.
    pub cooldown: Duration,
    /// Deadline for sink metadata after stream acquisition.
    pub metadata_timeout: Duration,
    /// Settle delay between teardown and restart on a camera switch.
    pub switch_settle: Duration,
    /// Allow torch toggling.
    pub enable_flash: bool,
    /// Allow cycling between enumerated cameras.
    pub enable_camera_switch: bool,
    /// Initial device profile.
    pub profile: DeviceProfile,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            preferred_facing: FacingMode::Environment,
            scan_interval: Duration::from_millis(100),
            cooldown: Duration::from_millis(1500),
            metadata_timeout: Duration::from_secs(10),
            switch_settle: Duration::from_millis(500),
            enable_flash: true,
            enable_camera_switch: true,
            profile: DeviceProfile::Desktop,
        }
    }
}
