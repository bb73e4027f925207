// ── Device selection heuristics ──

use optiscan_platform::{CameraDevice, FacingMode};

/// Labels that textually suggest a rear-facing camera.
const REAR_LABEL_HINTS: [&str; 3] = ["back", "rear", "environment"];

/// Propose a default device from an enumeration result.
///
/// Prefers a device whose facing or label suggests the environment-facing
/// camera; falls back to the first entry. `None` only for an empty list.
pub fn pick_default(devices: &[CameraDevice]) -> Option<&CameraDevice> {
    devices
        .iter()
        .find(|d| {
            d.facing == Some(FacingMode::Environment) || label_suggests_rear(&d.label)
        })
        .or_else(|| devices.first())
}

fn label_suggests_rear(label: &str) -> bool {
    let label = label.to_lowercase();
    REAR_LABEL_HINTS.iter().any(|hint| label.contains(hint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use optiscan_platform::DeviceId;

    fn device(id: &str, label: &str, facing: Option<FacingMode>) -> CameraDevice {
        CameraDevice {
            id: DeviceId::new(id),
            label: label.to_owned(),
            facing,
        }
    }

    #[test]
    fn prefers_rear_label_over_position() {
        let devices = vec![
            device("front", "Front Camera", None),
            device("back", "Back Camera", None),
        ];
        assert_eq!(pick_default(&devices).map(|d| d.id.as_str()), Some("back"));
    }

    #[test]
    fn recognizes_rear_hints_case_insensitively() {
        for label in ["REAR wide", "Environment cam", "back ultra"] {
            let devices = vec![device("a", "Selfie", None), device("b", label, None)];
            assert_eq!(pick_default(&devices).map(|d| d.id.as_str()), Some("b"));
        }
    }

    #[test]
    fn facing_metadata_beats_labels() {
        let devices = vec![
            device("a", "Camera 0", None),
            device("b", "Camera 1", Some(FacingMode::Environment)),
        ];
        assert_eq!(pick_default(&devices).map(|d| d.id.as_str()), Some("b"));
    }

    #[test]
    fn falls_back_to_first_entry() {
        let devices = vec![device("only", "Integrated Webcam", None)];
        assert_eq!(pick_default(&devices).map(|d| d.id.as_str()), Some("only"));
        assert!(pick_default(&[]).is_none());
    }
}
