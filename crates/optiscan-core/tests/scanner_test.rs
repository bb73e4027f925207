#![allow(clippy::unwrap_used)]
// Engine behavior tests against the fake platform. Every timing property
// (tick cadence, cooldown, metadata deadline, settle delay) runs under a
// paused clock, so durations are exact rather than approximate.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::time::Instant;

use optiscan_core::{
    Detection, DetectionSource, DeviceProfile, ScanError, ScanPhase, Scanner, ScannerConfig,
};
use optiscan_platform::fake::{
    FakeCamera, FakeDecoder, FakeFailure, FakeHaptics, FakeNotifier, FakeSink,
};
use optiscan_platform::{
    CameraDevice, DeviceId, DeviceSelection, FacingMode, NoticeLevel, PlatformHandles, VideoSink,
    VideoTrack,
};

// ── Helpers ─────────────────────────────────────────────────────────

struct Rig {
    scanner: Scanner,
    camera: Arc<FakeCamera>,
    sink: Arc<FakeSink>,
    decoder: Arc<FakeDecoder>,
    haptics: Arc<FakeHaptics>,
    notifier: Arc<FakeNotifier>,
    scans: Arc<Mutex<Vec<Detection>>>,
}

impl Rig {
    fn scan_count(&self) -> usize {
        self.scans.lock().unwrap().len()
    }

    async fn wait_for_phase(&self, phase: ScanPhase) {
        let mut rx = self.scanner.subscribe();
        loop {
            if rx.borrow_and_update().phase == phase {
                return;
            }
            rx.changed().await.unwrap();
        }
    }
}

fn device(id: &str, label: &str, facing: Option<FacingMode>) -> CameraDevice {
    CameraDevice {
        id: DeviceId::new(id),
        label: label.to_owned(),
        facing,
    }
}

fn two_cameras() -> Vec<CameraDevice> {
    vec![
        device("front", "Front Camera", Some(FacingMode::User)),
        device("back", "Back Camera", None),
    ]
}

fn rig_with(config: ScannerConfig, devices: Vec<CameraDevice>) -> Rig {
    let camera = Arc::new(FakeCamera::with_devices(devices));
    let sink = Arc::new(FakeSink::default());
    let decoder = Arc::new(FakeDecoder::default());
    let haptics = Arc::new(FakeHaptics::default());
    let notifier = Arc::new(FakeNotifier::default());
    let scans: Arc<Mutex<Vec<Detection>>> = Arc::new(Mutex::new(Vec::new()));

    let handles = PlatformHandles {
        camera: camera.clone(),
        sink: sink.clone(),
        decoder: decoder.clone(),
        haptics: haptics.clone(),
        notifier: notifier.clone(),
    };
    let recorded = Arc::clone(&scans);
    let scanner = Scanner::new(config, handles, move |detection: &Detection| {
        recorded.lock().unwrap().push(detection.clone());
    });

    Rig {
        scanner,
        camera,
        sink,
        decoder,
        haptics,
        notifier,
        scans,
    }
}

fn rig(devices: Vec<CameraDevice>) -> Rig {
    rig_with(ScannerConfig::default(), devices)
}

// ── Enumeration and selection ───────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn start_selects_rear_camera_by_label() {
    let rig = rig(two_cameras());

    rig.scanner.start().await.unwrap();

    let state = rig.scanner.state();
    assert_eq!(state.selected_camera, Some(DeviceId::new("back")));
    assert!(
        state
            .available_cameras
            .iter()
            .any(|d| Some(&d.id) == state.selected_camera.as_ref()),
        "selection must reference an enumerated device"
    );
    // enumeration settles the selection, so negotiation pins the device
    let constraints = rig.camera.constraints_for_call(0).unwrap();
    assert_eq!(
        constraints.device,
        DeviceSelection::Exact(DeviceId::new("back"))
    );
}

#[tokio::test(start_paused = true)]
async fn enumeration_failure_surfaces_as_error_state() {
    let rig = rig(Vec::new());
    rig.camera
        .fail_next_enumerate(FakeFailure::EnumerationUnsupported);

    let result = rig.scanner.start().await;

    assert!(matches!(result, Err(ScanError::EnumerationUnsupported)));
    let state = rig.scanner.state();
    assert_eq!(state.phase, ScanPhase::Error);
    assert!(state.error.is_some());
}

// ── Start / stop lifecycle ──────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn start_while_scanning_is_a_noop() {
    let rig = rig(two_cameras());

    rig.scanner.start().await.unwrap();
    let before = rig.scanner.state();
    rig.scanner.start().await.unwrap();

    assert_eq!(rig.camera.open_count(), 1, "no second session");
    let after = rig.scanner.state();
    assert_eq!(after.phase, before.phase);
    assert_eq!(after.selected_camera, before.selected_camera);
}

#[tokio::test(start_paused = true)]
async fn stop_releases_every_track_and_clears_the_sink() {
    let rig = rig(two_cameras());

    rig.scanner.start().await.unwrap();
    assert!(rig.sink.has_source());
    let tracks = rig.camera.all_tracks();
    assert!(!tracks.is_empty());

    rig.scanner.stop().await;

    assert!(tracks.iter().all(|t| t.is_stopped()));
    assert!(!rig.sink.has_source());
    let state = rig.scanner.state();
    assert_eq!(state.phase, ScanPhase::Idle);
    assert!(!state.is_scanning());
    assert_eq!(state.has_permission, None);
    assert!(!state.flash_enabled);
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_from_any_state() {
    let rig = rig(two_cameras());

    rig.scanner.stop().await;
    assert_eq!(rig.scanner.state().phase, ScanPhase::Idle);

    rig.scanner.start().await.unwrap();
    rig.scanner.stop().await;
    rig.scanner.stop().await;
    assert_eq!(rig.scanner.state().phase, ScanPhase::Idle);
}

// ── Scan loop ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn decode_hit_processes_then_auto_stops_after_cooldown() {
    let rig = rig(two_cameras());
    rig.decoder.push_empty_frames(2);
    rig.decoder.push_hit("inventory-slot-7");

    rig.scanner.start().await.unwrap();
    rig.wait_for_phase(ScanPhase::Processing).await;
    let processing_at = Instant::now();

    let state = rig.scanner.state();
    assert!(state.is_processing());
    assert_eq!(rig.scan_count(), 1, "callback fires before the cooldown");

    rig.wait_for_phase(ScanPhase::Idle).await;
    assert_eq!(processing_at.elapsed(), Duration::from_millis(1500));

    let state = rig.scanner.state();
    assert!(!state.is_scanning());
    assert!(state.last_detection.is_some());
    assert!(!rig.sink.has_source(), "session released on auto-stop");
    assert!(rig.camera.all_tracks().iter().all(|t| t.is_stopped()));
    assert_eq!(rig.scan_count(), 1, "callback fires exactly once");
    assert_eq!(rig.haptics.pattern_count(), 0, "no haptics on desktop");
}

#[tokio::test(start_paused = true)]
async fn transient_decode_failures_do_not_abort_the_loop() {
    let rig = rig(two_cameras());
    rig.decoder.push_failure("sensor not ready");
    rig.decoder.push_empty_frames(1);
    rig.decoder.push_hit("after-the-noise");

    rig.scanner.start().await.unwrap();
    rig.wait_for_phase(ScanPhase::Processing).await;

    assert!(rig.decoder.frame_attempts() >= 3);
    assert_eq!(rig.scan_count(), 1);
    assert_eq!(
        rig.scans.lock().unwrap()[0].text,
        "after-the-noise".to_owned()
    );
}

// ── Permission negotiation ──────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn permission_denied_goes_straight_to_error() {
    let rig = rig(two_cameras());
    rig.camera.fail_next_open(FakeFailure::PermissionDenied);

    let result = rig.scanner.start().await;

    assert!(matches!(result, Err(ScanError::PermissionDenied)));
    let state = rig.scanner.state();
    assert_eq!(state.phase, ScanPhase::Error);
    assert!(!state.is_scanning());
    assert_eq!(state.has_permission, Some(false));
    assert!(
        state.error.as_deref().is_some_and(|m| !m.is_empty()),
        "a user-facing message is recorded"
    );
    assert!(!rig.sink.has_source(), "no resources held after the failure");
    assert!(!rig.notifier.messages_at(NoticeLevel::Error).is_empty());
}

#[tokio::test(start_paused = true)]
async fn device_busy_maps_to_its_own_variant() {
    let rig = rig(two_cameras());
    rig.camera.fail_next_open(FakeFailure::DeviceBusy);

    let result = rig.scanner.start().await;
    assert!(matches!(result, Err(ScanError::DeviceBusy)));
}

#[tokio::test(start_paused = true)]
async fn metadata_deadline_releases_the_partial_stream() {
    let rig = rig(two_cameras());
    rig.sink
        .metadata_never_arrives
        .store(true, std::sync::atomic::Ordering::Relaxed);

    let started_at = Instant::now();
    let result = rig.scanner.start().await;

    assert!(matches!(
        result,
        Err(ScanError::InitializationTimeout { timeout_secs: 10 })
    ));
    assert_eq!(started_at.elapsed(), Duration::from_secs(10));
    assert_eq!(rig.camera.open_count(), 1);
    assert!(
        rig.camera.all_tracks().iter().all(|t| t.is_stopped()),
        "the partially-acquired stream is released"
    );
    assert!(!rig.sink.has_source());
    assert_eq!(rig.scanner.state().phase, ScanPhase::Error);
}

#[tokio::test(start_paused = true)]
async fn retry_clears_the_error_and_renegotiates_from_scratch() {
    let rig = rig(two_cameras());
    rig.camera.fail_next_open(FakeFailure::PermissionDenied);

    assert!(rig.scanner.start().await.is_err());
    assert_eq!(rig.scanner.state().phase, ScanPhase::Error);

    rig.scanner.retry().await.unwrap();

    let state = rig.scanner.state();
    assert_eq!(state.phase, ScanPhase::Scanning);
    assert_eq!(state.error, None);
    assert_eq!(state.has_permission, Some(true));
    assert_eq!(rig.camera.open_count(), 2, "a full re-negotiation happened");
}

// ── Capability control ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn toggle_flash_without_torch_capability_fails_cleanly() {
    let rig = rig(two_cameras());
    rig.scanner.start().await.unwrap();

    let result = rig.scanner.toggle_flash().await;

    assert!(matches!(result, Err(ScanError::FlashUnsupported)));
    assert!(!rig.scanner.state().flash_enabled);
}

#[tokio::test(start_paused = true)]
async fn toggle_flash_round_trips_on_a_torch_capable_track() {
    let rig = rig(two_cameras());
    rig.camera
        .torch_capable
        .store(true, std::sync::atomic::Ordering::Relaxed);
    rig.scanner.start().await.unwrap();

    assert!(rig.scanner.toggle_flash().await.unwrap());
    assert!(rig.scanner.state().flash_enabled);
    let track = &rig.camera.all_tracks()[0];
    assert!(track.torch_on.load(std::sync::atomic::Ordering::Relaxed));

    assert!(!rig.scanner.toggle_flash().await.unwrap());
    assert!(!rig.scanner.state().flash_enabled);
}

#[tokio::test(start_paused = true)]
async fn toggle_flash_requires_an_open_session() {
    let rig = rig(two_cameras());
    assert!(matches!(
        rig.scanner.toggle_flash().await,
        Err(ScanError::NotScanning)
    ));
}

#[tokio::test(start_paused = true)]
async fn switch_camera_with_a_single_device_fails_without_mutation() {
    let rig = rig(vec![device("only", "Integrated Webcam", None)]);
    rig.scanner.refresh_devices().await.unwrap();
    let before = rig.scanner.state().selected_camera.clone();

    let result = rig.scanner.switch_camera().await;

    assert!(matches!(result, Err(ScanError::OnlyOneCameraAvailable)));
    assert_eq!(rig.scanner.state().selected_camera, before);
}

#[tokio::test(start_paused = true)]
async fn switch_camera_advances_round_robin() {
    let rig = rig(vec![
        device("cam0", "Camera 0", None),
        device("cam1", "Camera 1", None),
        device("cam2", "Camera 2", None),
    ]);
    rig.scanner.refresh_devices().await.unwrap();
    assert_eq!(
        rig.scanner.state().selected_camera,
        Some(DeviceId::new("cam0"))
    );

    assert_eq!(
        rig.scanner.switch_camera().await.unwrap(),
        DeviceId::new("cam1")
    );
    assert_eq!(
        rig.scanner.switch_camera().await.unwrap(),
        DeviceId::new("cam2")
    );
    assert_eq!(
        rig.scanner.switch_camera().await.unwrap(),
        DeviceId::new("cam0")
    );
}

#[tokio::test(start_paused = true)]
async fn switch_camera_while_scanning_restarts_against_the_new_device() {
    let rig = rig(two_cameras());
    rig.scanner.start().await.unwrap();
    assert_eq!(rig.camera.open_count(), 1);

    rig.scanner.switch_camera().await.unwrap();

    let state = rig.scanner.state();
    assert_eq!(state.selected_camera, Some(DeviceId::new("front")));
    assert_eq!(state.phase, ScanPhase::Scanning);
    assert_eq!(rig.camera.open_count(), 2);
    assert_eq!(
        rig.camera.constraints_for_call(1).unwrap().device,
        DeviceSelection::Exact(DeviceId::new("front"))
    );

    let streams = rig.camera.streams.lock().unwrap();
    assert!(
        streams[0].tracks.iter().all(|t| t.is_stopped()),
        "old session fully torn down before the new one"
    );
    assert!(streams[1].tracks.iter().all(|t| !t.is_stopped()));
}

// ── Device profile ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn profile_drives_the_constraint_envelope() {
    let rig = rig(two_cameras());

    rig.scanner.start().await.unwrap();
    let desktop = rig.camera.constraints_for_call(0).unwrap();
    assert_eq!(desktop.width.ideal, Some(1920));
    assert_eq!(desktop.frame_rate.max, None);
    rig.scanner.stop().await;

    rig.scanner.set_profile(DeviceProfile::Mobile);
    rig.scanner.start().await.unwrap();
    let mobile = rig.camera.constraints_for_call(1).unwrap();
    assert_eq!(mobile.width.ideal, Some(1280));
    assert_eq!(mobile.width.max, Some(1920));
    assert_eq!(mobile.frame_rate.max, Some(30));
}

#[tokio::test(start_paused = true)]
async fn profile_change_does_not_disturb_an_active_session() {
    let rig = rig(two_cameras());
    rig.scanner.start().await.unwrap();

    rig.scanner.set_profile(DeviceProfile::Mobile);

    let state = rig.scanner.state();
    assert!(state.mobile_profile);
    assert_eq!(state.phase, ScanPhase::Scanning);
    assert_eq!(rig.camera.open_count(), 1);
    assert!(rig.camera.all_tracks().iter().all(|t| !t.is_stopped()));
}

// ── Image fallback path ─────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn image_file_with_a_code_resolves_true_and_fires_once() {
    let rig = rig(two_cameras());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checkin.png");
    std::fs::write(&path, b"encoded-checkin-image").unwrap();
    rig.decoder.register_image(
        b"encoded-checkin-image".to_vec(),
        "https://example.com/checkin/42",
    );

    let found = rig.scanner.process_image_file(&path).await.unwrap();

    assert!(found);
    let scans = rig.scans.lock().unwrap();
    assert_eq!(scans.len(), 1);
    assert_eq!(
        scans[0],
        Detection {
            text: "https://example.com/checkin/42".to_owned(),
            source: DetectionSource::Image,
        }
    );
    drop(scans);
    assert!(!rig.scanner.state().processing_image);
    assert!(!rig.notifier.messages_at(NoticeLevel::Success).is_empty());
}

#[tokio::test(start_paused = true)]
async fn image_file_without_a_code_resolves_false() {
    let rig = rig(two_cameras());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blank.png");
    std::fs::write(&path, b"no-code-here").unwrap();

    let found = rig.scanner.process_image_file(&path).await.unwrap();

    assert!(!found);
    assert_eq!(rig.scan_count(), 0, "the callback never fires");
    assert!(!rig.scanner.state().processing_image);
    assert!(!rig.notifier.messages_at(NoticeLevel::Error).is_empty());
}

#[tokio::test(start_paused = true)]
async fn unreadable_image_file_is_an_error_not_a_miss() {
    let rig = rig(two_cameras());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.png");

    let result = rig.scanner.process_image_file(&path).await;

    assert!(matches!(result, Err(ScanError::ImageUnreadable { .. })));
    assert!(!rig.scanner.state().processing_image);
    assert_eq!(rig.scan_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn image_decode_runs_alongside_an_active_session() {
    let rig = rig(two_cameras());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aisle.png");
    std::fs::write(&path, b"aisle-image").unwrap();
    rig.decoder.register_image(b"aisle-image".to_vec(), "aisle-9");

    rig.scanner.start().await.unwrap();
    let found = rig.scanner.process_image_file(&path).await.unwrap();

    assert!(found);
    let state = rig.scanner.state();
    assert_eq!(state.phase, ScanPhase::Scanning, "live session undisturbed");
    assert!(rig.camera.all_tracks().iter().all(|t| !t.is_stopped()));

    rig.scanner.stop().await;
}

// ── End to end ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn mobile_checkin_flow_scans_and_auto_stops() {
    let config = ScannerConfig {
        profile: DeviceProfile::Mobile,
        ..ScannerConfig::default()
    };
    let rig = rig_with(config, two_cameras());
    rig.decoder.push_empty_frames(2);
    rig.decoder.push_hit("https://example.com/checkin/42");

    rig.scanner.start().await.unwrap();

    // rear camera by label heuristic, mobile constraint envelope
    let state = rig.scanner.state();
    assert_eq!(state.selected_camera, Some(DeviceId::new("back")));
    let constraints = rig.camera.constraints_for_call(0).unwrap();
    assert_eq!(constraints.width.ideal, Some(1280));
    assert_eq!(constraints.frame_rate.max, Some(30));

    rig.wait_for_phase(ScanPhase::Processing).await;
    let processing_at = Instant::now();

    assert_eq!(rig.haptics.pattern_count(), 1, "haptics on mobile profile");
    assert_eq!(
        rig.haptics.last_pattern().unwrap(),
        vec![
            Duration::from_millis(200),
            Duration::from_millis(100),
            Duration::from_millis(200),
        ]
    );
    assert_eq!(rig.scan_count(), 1);
    assert_eq!(
        rig.scans.lock().unwrap()[0].text,
        "https://example.com/checkin/42".to_owned()
    );

    rig.wait_for_phase(ScanPhase::Idle).await;
    assert_eq!(processing_at.elapsed(), Duration::from_millis(1500));
    assert_eq!(rig.scan_count(), 1, "no duplicate trigger from the cooldown");
    assert!(!rig.sink.has_source());
}

#[tokio::test(start_paused = true)]
async fn detections_broadcast_mirrors_the_callback() {
    let rig = rig(two_cameras());
    let mut detections = rig.scanner.detections();
    rig.decoder.push_hit("broadcast-me");

    rig.scanner.start().await.unwrap();
    rig.wait_for_phase(ScanPhase::Processing).await;

    let detection = detections.try_recv().unwrap();
    assert_eq!(detection.text, "broadcast-me");
    assert_eq!(detection.source, DetectionSource::Stream);
}
