#![allow(clippy::unwrap_used)]
// Integration tests for `ProtectClient` using wiremock.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use protect_api::{Error, NvrPlatform, ProtectClient, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

fn client_for(server: &MockServer) -> ProtectClient {
    let base_url = Url::parse(&server.uri()).unwrap();
    ProtectClient::new(
        base_url,
        "admin",
        "hunter2".to_owned().into(),
        &TransportConfig::default(),
    )
    .unwrap()
}

/// Unsigned JWT with the given expiry offset from now.
fn jwt_expiring_in(offset: Duration) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let exp = (Utc::now() + offset).timestamp();
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp}}}"#));
    format!("{header}.{payload}.sig")
}

/// Mount the modern-flavor probe + login mocks with a CSRF token that
/// stays valid for an hour.
async fn mount_modern_auth(server: &MockServer) {
    let token = jwt_expiring_in(Duration::hours(1));

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-csrf-token", token.as_str()))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-csrf-token", token.as_str())
                .set_body_json(json!({})),
        )
        .mount(server)
        .await;
}

// ── Platform detection ──────────────────────────────────────────────

#[tokio::test]
async fn detect_modern_platform_from_csrf_header() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-csrf-token", "probe-token"))
        .expect(1)
        .mount(&server)
        .await;

    let platform = client.detect_platform().await.unwrap();
    assert_eq!(platform, NvrPlatform::UnifiOs);

    // Second call must use the cached result, not a second probe.
    let platform = client.detect_platform().await.unwrap();
    assert_eq!(platform, NvrPlatform::UnifiOs);
}

#[tokio::test]
async fn detect_standalone_platform_without_csrf_header() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let platform = client.detect_platform().await.unwrap();
    assert_eq!(platform, NvrPlatform::Standalone);
}

// ── Authentication ──────────────────────────────────────────────────

#[tokio::test]
async fn modern_login_captures_csrf_token() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    mount_modern_auth(&server).await;

    assert!(!client.is_authenticated());
    client.login().await.unwrap();
    assert!(client.is_authenticated());
}

#[tokio::test]
async fn expired_csrf_token_reads_unauthenticated_without_network() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    let stale = jwt_expiring_in(Duration::seconds(-30));

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-csrf-token", stale.as_str()))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("x-csrf-token", stale.as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;

    client.login().await.unwrap();

    // Token already past expiry: the liveness check must fail locally.
    // The mock expectation proves no extra request is issued.
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn standalone_login_stores_bearer_token() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth"))
        .respond_with(ResponseTemplate::new(200).insert_header("Authorization", "opaque-token"))
        .mount(&server)
        .await;

    client.login().await.unwrap();
    assert!(client.is_authenticated());
}

#[tokio::test]
async fn login_rejection_maps_to_authentication_error() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.login().await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
    assert!(!client.is_authenticated());
}

// ── Bootstrap ───────────────────────────────────────────────────────

#[tokio::test]
async fn bootstrap_fetches_and_parses_devices() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    mount_modern_auth(&server).await;

    let payload = json!({
        "nvr": { "id": "nvr1", "type": "UNVR", "version": "1.21.0" },
        "cameras": [{
            "id": "c1",
            "name": "Driveway",
            "type": "UVC G4 Bullet",
            "state": "CONNECTED",
            "recordingSettings": { "mode": "motion" },
            "ispSettings": { "irLedMode": "auto" },
            "channels": [
                { "isRtspEnabled": false, "rtspAlias": null },
                { "isRtspEnabled": true, "rtspAlias": "abcd" }
            ]
        }],
        "lights": [{ "id": "l1", "name": "Floodlight", "isLightOn": true }]
    });

    Mock::given(method("GET"))
        .and(path("/proxy/protect/api/bootstrap"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&payload))
        .mount(&server)
        .await;

    let bootstrap = client.bootstrap().await.unwrap();

    assert_eq!(bootstrap.cameras.len(), 1);
    assert_eq!(bootstrap.cameras[0].id, "c1");
    assert_eq!(bootstrap.cameras[0].state.as_deref(), Some("CONNECTED"));
    assert_eq!(bootstrap.lights.len(), 1);
    assert!(bootstrap.lights[0].is_light_on);

    let nvr = bootstrap.nvr.unwrap();
    assert_eq!(nvr.id, "nvr1");
    assert_eq!(nvr.version.as_deref(), Some("1.21.0"));
}

#[tokio::test]
async fn server_information_errors_without_nvr_block() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    mount_modern_auth(&server).await;

    Mock::given(method("GET"))
        .and(path("/proxy/protect/api/bootstrap"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "cameras": [] })))
        .mount(&server)
        .await;

    let result = client.server_information().await;
    assert!(matches!(result, Err(Error::Deserialization { .. })));
}

// ── Events ──────────────────────────────────────────────────────────

#[tokio::test]
async fn motion_events_query_motion_type_over_window() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    mount_modern_auth(&server).await;

    Mock::given(method("GET"))
        .and(path("/proxy/protect/api/events"))
        .and(query_param("type", "motion"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "camera": "c1", "start": 1_700_000_000_000_i64, "end": null, "score": 61 }
        ])))
        .mount(&server)
        .await;

    let events = client.motion_events(10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].camera.as_deref(), Some("c1"));
    assert_eq!(events[0].score, 61);
}

// ── Camera mutations ────────────────────────────────────────────────

#[tokio::test]
async fn set_recording_mode_patches_camera() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    mount_modern_auth(&server).await;

    Mock::given(method("PATCH"))
        .and(path("/proxy/protect/api/cameras/c1"))
        .and(body_partial_json(
            json!({ "recordingSettings": { "mode": "always" } }),
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.set_recording_mode("c1", "always").await.unwrap();
}

#[tokio::test]
async fn set_ir_mode_translates_host_aliases() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    mount_modern_auth(&server).await;

    Mock::given(method("PATCH"))
        .and(path("/proxy/protect/api/cameras/c1"))
        .and(body_partial_json(
            json!({ "ispSettings": { "irLedMode": "autoFilterOnly" } }),
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.set_ir_mode("c1", "led_off").await.unwrap();
}

// ── Error translation ───────────────────────────────────────────────

#[tokio::test]
async fn missing_path_maps_to_not_found() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    mount_modern_auth(&server).await;

    Mock::given(method("GET"))
        .and(path("/proxy/protect/api/bootstrap"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = client.bootstrap().await;
    assert!(
        matches!(result, Err(Error::NotFound { .. })),
        "expected NotFound, got: {result:?}"
    );
}

#[tokio::test]
async fn server_error_maps_to_nvr_error() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    mount_modern_auth(&server).await;

    Mock::given(method("GET"))
        .and(path("/proxy/protect/api/bootstrap"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let result = client.bootstrap().await;
    assert!(
        matches!(result, Err(Error::Nvr { status: 500, .. })),
        "expected Nvr error, got: {result:?}"
    );
}

#[tokio::test]
async fn rejected_fetch_invalidates_session() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    mount_modern_auth(&server).await;

    Mock::given(method("GET"))
        .and(path("/proxy/protect/api/bootstrap"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    client.login().await.unwrap();
    assert!(client.is_authenticated());

    let result = client.bootstrap().await;
    assert!(matches!(result, Err(Error::Authentication { .. })));
    assert!(!client.is_authenticated());
}
