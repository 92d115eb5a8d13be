// Integration tests for `ProtectData` against a mock NVR.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use protect_core::{
    CoordinatorState, CoreError, DeviceKind, NvrConfig, ProtectData, RecordingMode,
    TlsVerification,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn session_jwt() -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let exp = (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp();
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp}}}"#));
    format!("{header}.{payload}.sig")
}

fn config_for(server: &MockServer) -> NvrConfig {
    let addr = server.address();
    NvrConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        https: false,
        username: "admin".into(),
        password: SecretString::from("secret".to_owned()),
        tls: TlsVerification::SystemDefaults,
        timeout: Duration::from_secs(5),
        scan_interval: Duration::from_millis(50),
        minimum_score: 0,
        websocket_enabled: false,
    }
}

/// Probe + login mocks for the UniFi OS flavor.
async fn mount_auth(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-csrf-token", "probe"))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-csrf-token", session_jwt())
                .set_body_json(json!({})),
        )
        .mount(server)
        .await;
}

async fn mount_bootstrap(server: &MockServer, cameras: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/proxy/protect/api/bootstrap"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nvr": { "id": "nvr1", "name": "Protect", "mac": "AABBCC", "version": "1.17.0" },
            "cameras": cameras,
        })))
        .mount(server)
        .await;
}

async fn mount_events(server: &MockServer, events: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/proxy/protect/api/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(events))
        .mount(server)
        .await;
}

/// Subscriber callback that records each notified device id.
fn recording_callback() -> (protect_core::UpdateCallback, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: protect_core::UpdateCallback = Arc::new(move |device: &protect_core::Device| {
        sink.lock().unwrap().push(device.id.clone());
    });
    (callback, seen)
}

// ── Setup and refresh ───────────────────────────────────────────────

#[tokio::test]
async fn setup_loads_initial_snapshot() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_bootstrap(
        &server,
        json!([{ "id": "c1", "name": "Porch", "state": "CONNECTED" }]),
    )
    .await;
    mount_events(&server, json!([])).await;

    let coordinator = ProtectData::new(config_for(&server)).unwrap();
    let state = coordinator.state();
    assert_eq!(*state.borrow(), CoordinatorState::Stopped);

    coordinator.setup().await.unwrap();

    assert_eq!(*state.borrow(), CoordinatorState::Running);
    assert!(coordinator.last_update_success());
    let device = coordinator.device("c1").unwrap();
    assert_eq!(device.name, "Porch");
    assert!(device.online);
    assert_eq!(coordinator.devices_by_kind(&[DeviceKind::Camera]).len(), 1);
    assert_eq!(coordinator.devices_by_kind(&[DeviceKind::Nvr]).len(), 1);

    coordinator.stop();
    assert_eq!(*state.borrow(), CoordinatorState::Stopped);
}

#[tokio::test]
async fn open_motion_event_arms_camera_on_refresh() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_bootstrap(&server, json!([{ "id": "c1" }])).await;
    mount_events(
        &server,
        json!([{ "id": "e1", "camera": "c1", "start": 1_700_000_000_000_i64, "score": 80,
                 "thumbnail": "e-thumb" }]),
    )
    .await;

    let coordinator = ProtectData::new(config_for(&server)).unwrap();
    coordinator.setup().await.unwrap();

    let camera = coordinator.device("c1").unwrap();
    let state = camera.camera().unwrap();
    assert!(state.motion.active);
    assert_eq!(state.motion.score, 80);
    assert_eq!(state.motion.thumbnail.as_deref(), Some("e-thumb"));

    coordinator.stop();
}

#[tokio::test]
async fn refresh_notifies_subscribers_of_changes() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_events(&server, json!([])).await;

    Mock::given(method("GET"))
        .and(path("/proxy/protect/api/bootstrap"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nvr": { "id": "nvr1" },
            "cameras": [{ "id": "c1", "recordingSettings": { "mode": "never" } }],
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/proxy/protect/api/bootstrap"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nvr": { "id": "nvr1" },
            "cameras": [{ "id": "c1", "recordingSettings": { "mode": "always" } }],
        })))
        .mount(&server)
        .await;

    let coordinator = ProtectData::new(config_for(&server)).unwrap();
    coordinator.setup().await.unwrap();

    let (callback, seen) = recording_callback();
    let handle = coordinator.subscribe("c1", callback);

    coordinator.refresh(true).await.unwrap();
    assert_eq!(seen.lock().unwrap().as_slice(), ["c1"]);
    assert_eq!(
        coordinator
            .device("c1")
            .unwrap()
            .camera()
            .unwrap()
            .recording_mode,
        Some(RecordingMode::Always)
    );

    // Unchanged payload on the next pass: no further notification.
    coordinator.refresh(true).await.unwrap();
    assert_eq!(seen.lock().unwrap().len(), 1);

    coordinator.unsubscribe(handle);
    coordinator.stop();
}

#[tokio::test]
async fn transient_failure_clears_and_restores_success_flag() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_events(&server, json!([])).await;

    Mock::given(method("GET"))
        .and(path("/proxy/protect/api/bootstrap"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/proxy/protect/api/bootstrap"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nvr": { "id": "nvr1" },
            "cameras": [],
        })))
        .mount(&server)
        .await;

    let coordinator = ProtectData::new(config_for(&server)).unwrap();
    assert!(coordinator.setup().await.is_err());
    assert!(!coordinator.last_update_success());

    coordinator.refresh(true).await.unwrap();
    assert!(coordinator.last_update_success());

    coordinator.stop();
}

// ── Authentication failure ──────────────────────────────────────────

#[tokio::test]
async fn rejected_credentials_stop_coordinator_and_raise_reauth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-csrf-token", "probe"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "bad creds"})))
        .mount(&server)
        .await;

    let coordinator = ProtectData::new(config_for(&server)).unwrap();
    let reauth = coordinator.reauth_required();
    assert!(!*reauth.borrow());

    let err = coordinator.setup().await.unwrap_err();
    assert!(err.requires_reauth());
    assert!(*reauth.borrow());
    assert!(!coordinator.last_update_success());
    assert_eq!(*coordinator.state().borrow(), CoordinatorState::Stopped);

    // Stopped: further refreshes are refused outright.
    assert!(matches!(
        coordinator.refresh(true).await,
        Err(CoreError::Stopped)
    ));
}

// ── Stop semantics ──────────────────────────────────────────────────

#[tokio::test]
async fn stop_is_idempotent_and_blocks_refresh() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_bootstrap(&server, json!([])).await;
    mount_events(&server, json!([])).await;

    let coordinator = ProtectData::new(config_for(&server)).unwrap();
    coordinator.setup().await.unwrap();

    coordinator.stop();
    coordinator.stop();

    assert!(matches!(
        coordinator.refresh(false).await,
        Err(CoreError::Stopped)
    ));
}

#[tokio::test]
async fn stop_during_refresh_discards_results_and_signals_nothing() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_events(&server, json!([])).await;

    Mock::given(method("GET"))
        .and(path("/proxy/protect/api/bootstrap"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nvr": { "id": "nvr1" },
            "cameras": [{ "id": "c1", "recordingSettings": { "mode": "never" } }],
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/proxy/protect/api/bootstrap"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(300))
                .set_body_json(json!({
                    "nvr": { "id": "nvr1" },
                    "cameras": [{ "id": "c1", "recordingSettings": { "mode": "always" } }],
                })),
        )
        .mount(&server)
        .await;

    let coordinator = ProtectData::new(config_for(&server)).unwrap();
    coordinator.setup().await.unwrap();

    let (callback, seen) = recording_callback();
    coordinator.subscribe("c1", callback);

    let in_flight = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.refresh(true).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    coordinator.stop();

    assert!(matches!(
        in_flight.await.unwrap(),
        Err(CoreError::Stopped)
    ));
    assert!(
        seen.lock().unwrap().is_empty(),
        "a refresh resolving after stop() must not notify subscribers"
    );
    assert_eq!(
        coordinator
            .device("c1")
            .unwrap()
            .camera()
            .unwrap()
            .recording_mode,
        Some(RecordingMode::Never),
        "a refresh resolving after stop() must not write its results"
    );
}

// ── Poll loop lifecycle ─────────────────────────────────────────────

#[tokio::test]
async fn poll_loop_runs_while_subscribed_and_stops_after() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_bootstrap(&server, json!([{ "id": "c1" }])).await;
    mount_events(&server, json!([])).await;

    let coordinator = ProtectData::new(config_for(&server)).unwrap();
    coordinator.setup().await.unwrap();

    let polls = |reqs: &[wiremock::Request]| {
        reqs.iter()
            .filter(|r| r.url.path() == "/proxy/protect/api/bootstrap")
            .count()
    };

    let before = polls(&server.received_requests().await.unwrap());

    let (callback, _seen) = recording_callback();
    let handle = coordinator.subscribe("c1", callback);
    tokio::time::sleep(Duration::from_millis(400)).await;

    let while_subscribed = polls(&server.received_requests().await.unwrap());
    assert!(
        while_subscribed > before,
        "poll loop should fetch while a subscriber exists"
    );

    coordinator.unsubscribe(handle);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let after_unsub = polls(&server.received_requests().await.unwrap());
    tokio::time::sleep(Duration::from_millis(300)).await;
    let settled = polls(&server.received_requests().await.unwrap());
    assert_eq!(
        after_unsub, settled,
        "poll loop should stop once the last subscriber leaves"
    );

    coordinator.stop();
}

// ── Control operations ──────────────────────────────────────────────

#[tokio::test]
async fn control_write_records_confirmed_value_and_signals() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_bootstrap(
        &server,
        json!([{ "id": "c1", "recordingSettings": { "mode": "never" } }]),
    )
    .await;
    mount_events(&server, json!([])).await;
    Mock::given(method("PATCH"))
        .and(path("/proxy/protect/api/cameras/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let coordinator = ProtectData::new(config_for(&server)).unwrap();
    coordinator.setup().await.unwrap();

    let (callback, seen) = recording_callback();
    coordinator.subscribe("c1", callback);

    coordinator
        .set_recording_mode("c1", RecordingMode::Always)
        .await
        .unwrap();

    assert_eq!(
        coordinator
            .device("c1")
            .unwrap()
            .camera()
            .unwrap()
            .recording_mode,
        Some(RecordingMode::Always)
    );
    assert_eq!(seen.lock().unwrap().as_slice(), ["c1"]);

    coordinator.stop();
}

#[tokio::test]
async fn control_write_for_unknown_camera_fails_before_network() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_bootstrap(&server, json!([])).await;
    mount_events(&server, json!([])).await;

    let coordinator = ProtectData::new(config_for(&server)).unwrap();
    coordinator.setup().await.unwrap();

    let err = coordinator.snapshot("ghost").await.unwrap_err();
    assert!(matches!(err, CoreError::DeviceNotFound { .. }));

    coordinator.stop();
}
