// ── Constraint profiles ──
//
// Builds the acquisition constraint envelope for a negotiation attempt.
// Mobile profiles cap resolution and frame rate to keep decode latency
// predictable on weaker hardware; desktop profiles ask for more pixels.

use optiscan_platform::{DeviceId, DeviceSelection, FacingMode, RangeHint, StreamConstraints};

use crate::config::DeviceProfile;

const ASPECT_16_9: f64 = 16.0 / 9.0;

/// Build the constraint profile for one acquisition attempt.
///
/// A pinned device always wins over the facing hint.
pub fn build_constraints(
    profile: DeviceProfile,
    pinned: Option<&DeviceId>,
    preferred_facing: FacingMode,
) -> StreamConstraints {
    let device = pinned.map_or(
        DeviceSelection::Facing(preferred_facing),
        |id| DeviceSelection::Exact(id.clone()),
    );

    match profile {
        DeviceProfile::Mobile => StreamConstraints {
            device,
            width: RangeHint {
                ideal: Some(1280),
                min: Some(640),
                max: Some(1920),
            },
            height: RangeHint {
                ideal: Some(720),
                min: Some(480),
                max: Some(1080),
            },
            frame_rate: RangeHint {
                ideal: Some(30),
                min: None,
                max: Some(30),
            },
            aspect_ratio: Some(ASPECT_16_9),
        },
        DeviceProfile::Desktop => StreamConstraints {
            device,
            width: RangeHint {
                ideal: Some(1920),
                min: Some(640),
                max: None,
            },
            height: RangeHint {
                ideal: Some(1080),
                min: Some(480),
                max: None,
            },
            frame_rate: RangeHint {
                ideal: Some(30),
                min: None,
                max: None,
            },
            aspect_ratio: Some(ASPECT_16_9),
        },
    }
}
