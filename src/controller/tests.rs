use super::*;
use crate::camera::{FacingMode, SyntheticCamera};
use crate::clock::ManualClock;
use crate::config::{CameraConfig, CaptureConfig, ProfilescanConfig};
use crate::decoder::{ScriptedDecoder, ScriptedFailure, ScriptedHandle};
use crate::profile::ProfileMap;
use crate::router::NoticeLevel;
use crate::store::{KeyValueStorage, MemoryStorage};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::sync::Arc;

const STORAGE_KEY: &str = "barcodeUsers";

struct Harness {
    controller: ScanFlowController,
    decodes: mpsc::UnboundedReceiver<DecodeEvent>,
    decoder: ScriptedHandle,
    storage: MemoryStorage,
    clock: ManualClock,
    camera: Arc<SyntheticCamera>,
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
}

fn create_test_camera(deny_permission: bool) -> Arc<SyntheticCamera> {
    Arc::new(SyntheticCamera::new(CameraConfig {
        resolution: (16, 12),
        fps: 30,
        deny_permission,
    }))
}

fn build(storage: Box<dyn KeyValueStorage>, decoder_uses_camera: bool) -> Harness {
    let config = ProfilescanConfig::default();
    let camera = create_test_camera(false);
    let clock = ManualClock::new(t0());
    let memory = MemoryStorage::new();

    let (decoder, handle) = ScriptedDecoder::new();
    let decoder = if decoder_uses_camera {
        decoder.with_camera(camera.clone())
    } else {
        decoder
    };

    let capture = CaptureHelper::new(
        CaptureConfig {
            facing: FacingMode::User,
            jpeg_quality: 80,
        },
        camera.clone(),
    );

    let (controller, decodes) = ScanFlowController::new(ControllerParts {
        scanner: config.scanner,
        store: ProfileStore::open(storage, STORAGE_KEY).unwrap(),
        decoder: Box::new(decoder),
        capture,
        clock: Box::new(clock.clone()),
    });

    Harness {
        controller,
        decodes,
        decoder: handle,
        storage: memory,
        clock,
        camera,
    }
}

fn harness() -> Harness {
    let storage = MemoryStorage::new();
    let mut h = build(Box::new(storage.clone()), false);
    h.storage = storage;
    h
}

impl Harness {
    async fn scan(&mut self, code: &str) {
        self.controller.request_scan().await.unwrap();
        assert!(self.decoder.emit(code), "decoder should be running");
        let event = self.decodes.recv().await.unwrap();
        self.controller.handle_decode(event).await.unwrap();
    }

    async fn fill_form(&mut self, first_name: &str, last_name: &str) {
        self.controller
            .apply(UserAction::EditForm(FormEdit::Set {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
            }))
            .await
            .unwrap();
    }

    async fn register(&mut self, code: &str, first_name: &str, last_name: &str) {
        self.scan(code).await;
        self.fill_form(first_name, last_name).await;
        self.controller.submit_registration().await.unwrap();
    }

    fn persisted(&self) -> ProfileMap {
        match self.storage.raw(STORAGE_KEY) {
            Some(raw) => serde_json::from_str(&raw).unwrap(),
            None => ProfileMap::new(),
        }
    }

    fn view(&self) -> View {
        self.controller.view_state().view
    }
}

#[tokio::test]
async fn test_unseen_code_goes_to_registration() {
    let mut h = harness();

    h.scan("1234567890123").await;

    assert_eq!(
        h.controller.state(),
        &FlowState::Registering {
            barcode: "1234567890123".to_string()
        }
    );
    match h.view() {
        View::Register(register) => {
            assert_eq!(register.barcode, "1234567890123");
            assert_eq!(register.form, RegisterForm::default());
        }
        other => panic!("Unexpected view {:?}", other),
    }
    assert!(h.controller.store().is_empty());
    assert!(h.persisted().is_empty());
    assert!(!h.controller.decoder_running());
}

#[tokio::test]
async fn test_registration_creates_profile_with_one_scan() {
    let mut h = harness();

    h.register("1234567890123", "Ana", "Silva").await;

    let profile = h.controller.store().get("1234567890123").unwrap();
    assert_eq!(profile.first_name, "Ana");
    assert_eq!(profile.last_name, "Silva");
    assert_eq!(profile.scans(), &[t0()]);
    assert!(profile.photo.is_none());

    assert_eq!(
        h.controller.state(),
        &FlowState::ProfileShown {
            barcode: "1234567890123".to_string(),
            origin: ProfileOrigin::Scan
        }
    );
    let persisted = h.persisted();
    assert_eq!(persisted["1234567890123"].prenom, "Ana");
    assert_eq!(persisted["1234567890123"].nom, "Silva");
    assert_eq!(persisted["1234567890123"].scans, vec![t0()]);
}

#[tokio::test]
async fn test_rescan_appends_exactly_one_timestamp() {
    let mut h = harness();
    h.register("1234567890123", "Ana", "Silva").await;
    h.controller.cancel().await.unwrap();

    h.clock.advance(ChronoDuration::minutes(5));
    h.scan("1234567890123").await;

    let profile = h.controller.store().get("1234567890123").unwrap();
    let scans = profile.scans();
    assert_eq!(scans.len(), 2);
    assert_eq!(scans[0], t0());
    assert!(scans[1] > scans[0]);

    match h.view() {
        View::Profile(view) => {
            assert_eq!(view.scan_count, 2);
            assert_eq!(view.history[0], scans[1]);
            assert_eq!(view.origin, ProfileOrigin::Scan);
        }
        other => panic!("Unexpected view {:?}", other),
    }
    assert_eq!(h.persisted()["1234567890123"].scans.len(), 2);
}

#[tokio::test]
async fn test_repeated_scans_keep_earlier_entries() {
    let mut h = harness();
    h.register("42", "Ana", "Silva").await;

    let mut expected = vec![t0()];
    for _ in 0..3 {
        h.clock.advance(ChronoDuration::seconds(30));
        h.scan("42").await;
        expected.push(h.clock.now());

        assert_eq!(h.controller.store().get("42").unwrap().scans(), expected.as_slice());
    }
}

#[tokio::test]
async fn test_scan_with_unchanged_clock_still_moves_forward() {
    let mut h = harness();
    h.register("42", "Ana", "Silva").await;

    h.scan("42").await;

    let scans = h.controller.store().get("42").unwrap().scans().to_vec();
    assert_eq!(scans.len(), 2);
    assert!(scans[1] > scans[0]);
}

#[tokio::test]
async fn test_empty_names_are_rejected() {
    let mut h = harness();
    h.scan("42").await;

    for (first, last) in [("", "Silva"), ("Ana", ""), ("   ", "Silva"), ("Ana", "\t")] {
        h.fill_form(first, last).await;
        h.controller.submit_registration().await.unwrap();

        assert_eq!(
            h.controller.state(),
            &FlowState::Registering {
                barcode: "42".to_string()
            }
        );
        assert!(h.controller.store().is_empty());
        assert!(h.persisted().is_empty());

        let notice = h.controller.view_state().notice.unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.message, "Please fill in all fields.");
    }
}

#[tokio::test]
async fn test_names_are_trimmed() {
    let mut h = harness();

    h.register("42", "  Ana ", " Silva  ").await;

    let profile = h.controller.store().get("42").unwrap();
    assert_eq!(profile.display_name(), "Ana Silva");
}

#[tokio::test]
async fn test_form_editing_by_keystroke() {
    let mut h = harness();
    h.scan("42").await;

    for c in "Anx".chars() {
        h.controller.edit_form(FormEdit::Insert(c));
    }
    h.controller.edit_form(FormEdit::Backspace);
    h.controller.edit_form(FormEdit::Insert('a'));
    h.controller.edit_form(FormEdit::NextField);
    for c in "Silva".chars() {
        h.controller.edit_form(FormEdit::Insert(c));
    }
    h.controller.submit_registration().await.unwrap();

    assert_eq!(
        h.controller.store().get("42").unwrap().display_name(),
        "Ana Silva"
    );
}

#[tokio::test]
async fn test_only_first_decode_of_a_session_counts() {
    let mut h = harness();
    h.register("42", "Ana", "Silva").await;
    h.controller.cancel().await.unwrap();

    h.controller.request_scan().await.unwrap();
    assert!(h.decoder.emit("42"));
    assert!(h.decoder.emit("42"));

    let first = h.decodes.recv().await.unwrap();
    let second = h.decodes.recv().await.unwrap();
    h.controller.handle_decode(first).await.unwrap();
    h.controller.handle_decode(second).await.unwrap();

    assert_eq!(h.controller.store().get("42").unwrap().scan_count(), 2);
}

#[tokio::test]
async fn test_stale_session_decode_is_ignored() {
    let mut h = harness();
    h.register("42", "Ana", "Silva").await;
    h.controller.cancel().await.unwrap();

    h.controller.request_scan().await.unwrap();
    assert!(h.decoder.emit("42"));
    let stale = h.decodes.recv().await.unwrap();
    h.controller.cancel().await.unwrap();

    // A new session is open when the old decode finally lands
    h.controller.request_scan().await.unwrap();
    h.controller.handle_decode(stale).await.unwrap();

    assert!(matches!(h.controller.state(), FlowState::Scanning { .. }));
    assert_eq!(h.controller.store().get("42").unwrap().scan_count(), 1);
}

#[tokio::test]
async fn test_cancel_stops_decoder() {
    let mut h = harness();

    h.controller.request_scan().await.unwrap();
    assert!(h.controller.decoder_running());
    assert!(matches!(h.view(), View::Scanner(_)));

    h.controller.apply(UserAction::Cancel).await.unwrap();

    assert!(!h.decoder.is_running());
    assert_eq!(h.decoder.stop_count(), 1);
    assert_eq!(h.controller.state(), &FlowState::Idle);
    assert_eq!(h.view(), View::Home(HomeView { profile_count: 0 }));
}

#[tokio::test]
async fn test_list_during_scan_stops_decoder() {
    let mut h = harness();
    h.controller.request_scan().await.unwrap();

    h.controller.show_list().await.unwrap();

    assert!(!h.decoder.is_running());
    assert_eq!(h.controller.state(), &FlowState::Idle);
}

#[tokio::test]
async fn test_scan_request_while_scanning_is_noop() {
    let mut h = harness();

    h.controller.request_scan().await.unwrap();
    h.controller.request_scan().await.unwrap();

    assert_eq!(h.decoder.start_count(), 1);
    assert_eq!(h.decoder.last_target().as_deref(), Some("scanner-region"));
}

#[tokio::test]
async fn test_permission_failure_returns_to_idle() {
    let mut h = harness();
    h.decoder.fail_next_start(ScriptedFailure::PermissionDenied);

    h.controller.request_scan().await.unwrap();

    assert_eq!(h.controller.state(), &FlowState::Idle);
    let state = h.controller.view_state();
    assert_eq!(state.view, View::Home(HomeView { profile_count: 0 }));
    assert_eq!(
        state.notice.unwrap().message,
        "Camera access denied. Check the camera permissions."
    );

    // The user can simply try again
    h.controller.request_scan().await.unwrap();
    assert!(matches!(h.controller.state(), FlowState::Scanning { .. }));
}

#[tokio::test]
async fn test_decoder_init_failure_is_reported() {
    let mut h = harness();
    h.decoder.fail_next_start(ScriptedFailure::Init);

    h.controller.request_scan().await.unwrap();

    assert_eq!(h.controller.state(), &FlowState::Idle);
    assert!(h.controller.view_state().notice.is_some());
}

#[tokio::test]
async fn test_list_browsing_never_records_a_scan() {
    let mut h = harness();
    h.register("42", "Ana", "Silva").await;

    h.controller.show_list().await.unwrap();
    match h.view() {
        View::List(list) => {
            assert_eq!(list.entries.len(), 1);
            assert_eq!(list.entries[0].display_name, "Ana Silva");
            assert_eq!(list.entries[0].scan_count, 1);
        }
        other => panic!("Unexpected view {:?}", other),
    }

    h.clock.advance(ChronoDuration::minutes(1));
    h.controller.apply(UserAction::OpenSelected).await.unwrap();

    assert_eq!(
        h.controller.state(),
        &FlowState::ProfileShown {
            barcode: "42".to_string(),
            origin: ProfileOrigin::List
        }
    );
    assert_eq!(h.controller.store().get("42").unwrap().scan_count(), 1);
    assert_eq!(h.persisted()["42"].scans.len(), 1);
}

#[tokio::test]
async fn test_empty_list_offers_scanning() {
    let mut h = harness();

    h.controller.show_list().await.unwrap();

    match h.view() {
        View::List(list) => assert!(list.is_empty()),
        other => panic!("Unexpected view {:?}", other),
    }

    // The empty-state affordance starts a scan straight from the list
    h.controller.apply(UserAction::ScanRequested).await.unwrap();
    assert!(matches!(h.controller.state(), FlowState::Scanning { .. }));
}

#[tokio::test]
async fn test_open_unknown_profile_keeps_list() {
    let mut h = harness();
    h.controller.show_list().await.unwrap();

    h.controller
        .apply(UserAction::OpenProfile {
            barcode: "nope".to_string(),
        })
        .await
        .unwrap();

    assert!(matches!(h.view(), View::List(_)));
    assert!(h.controller.view_state().notice.is_some());
}

#[tokio::test]
async fn test_registration_with_photo() {
    let mut h = harness();
    h.scan("42").await;

    h.controller.apply(UserAction::StartPhoto).await.unwrap();
    assert!(h.camera.has_live_stream());
    match h.view() {
        View::Register(register) => assert_eq!(register.photo, PhotoStatus::Previewing),
        other => panic!("Unexpected view {:?}", other),
    }

    h.controller.apply(UserAction::TakePhoto).await.unwrap();
    assert!(!h.camera.has_live_stream());
    match h.view() {
        View::Register(register) => assert_eq!(register.photo, PhotoStatus::Captured),
        other => panic!("Unexpected view {:?}", other),
    }

    h.fill_form("Ana", "Silva").await;
    h.controller.submit_registration().await.unwrap();

    let profile = h.controller.store().get("42").unwrap();
    assert!(profile.photo.unwrap().is_jpeg());
    assert!(h.persisted()["42"].photo.starts_with("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn test_cancel_during_preview_releases_camera() {
    let mut h = harness();
    h.scan("42").await;
    h.controller.apply(UserAction::StartPhoto).await.unwrap();
    assert!(h.camera.has_live_stream());

    h.controller.cancel().await.unwrap();

    assert!(!h.camera.has_live_stream());
    assert!(h.controller.store().is_empty());
}

#[tokio::test]
async fn test_decoder_stream_released_before_photo_preview() {
    let storage = MemoryStorage::new();
    let mut h = build(Box::new(storage.clone()), true);
    h.storage = storage;

    h.controller.request_scan().await.unwrap();
    assert!(h.camera.has_live_stream());

    assert!(h.decoder.emit("42"));
    let event = h.decodes.recv().await.unwrap();
    h.controller.handle_decode(event).await.unwrap();
    assert!(!h.camera.has_live_stream());

    h.controller.apply(UserAction::StartPhoto).await.unwrap();
    assert!(h.controller.view_state().notice.is_none());
    assert!(h.camera.has_live_stream());
}

#[tokio::test]
async fn test_photo_permission_failure_keeps_registration() {
    let config = ProfilescanConfig::default();
    let (decoder, handle) = ScriptedDecoder::new();
    let (mut controller, mut decodes) = ScanFlowController::new(ControllerParts {
        scanner: config.scanner,
        store: ProfileStore::in_memory(),
        decoder: Box::new(decoder),
        capture: CaptureHelper::new(config.capture, create_test_camera(true)),
        clock: Box::new(ManualClock::new(t0())),
    });

    controller.request_scan().await.unwrap();
    handle.emit("42");
    controller
        .handle_decode(decodes.recv().await.unwrap())
        .await
        .unwrap();

    controller.apply(UserAction::StartPhoto).await.unwrap();

    assert!(matches!(controller.state(), FlowState::Registering { .. }));
    let state = controller.view_state();
    assert!(state.notice.is_some());
    match state.view {
        View::Register(register) => assert_eq!(register.photo, PhotoStatus::None),
        other => panic!("Unexpected view {:?}", other),
    }
}

struct FailingWrites {
    inner: MemoryStorage,
}

impl KeyValueStorage for FailingWrites {
    fn get_item(&self, key: &str) -> crate::error::Result<Option<String>> {
        self.inner.get_item(key)
    }

    fn set_item(&mut self, _key: &str, _value: &str) -> crate::error::Result<()> {
        Err(ScanError::storage("disk full"))
    }
}

#[tokio::test]
async fn test_storage_failure_is_fatal() {
    let mut h = build(
        Box::new(FailingWrites {
            inner: MemoryStorage::new(),
        }),
        false,
    );
    h.scan("42").await;
    h.fill_form("Ana", "Silva").await;

    let err = h.controller.submit_registration().await.unwrap_err();

    assert!(err.is_fatal());
    assert!(h.controller.store().is_empty());
}

#[tokio::test]
async fn test_blank_decode_keeps_session_open() {
    let mut h = harness();
    h.controller.request_scan().await.unwrap();

    assert!(h.decoder.emit("   "));
    let event = h.decodes.recv().await.unwrap();
    h.controller.handle_decode(event).await.unwrap();

    assert!(matches!(h.controller.state(), FlowState::Scanning { .. }));
    assert!(h.decoder.is_running());
}

#[tokio::test]
async fn test_quit_releases_everything() {
    let mut h = harness();
    h.controller.request_scan().await.unwrap();

    h.controller.apply(UserAction::Quit).await.unwrap();

    assert!(!h.decoder.is_running());
    assert_eq!(h.controller.state(), &FlowState::Idle);
}
