#![allow(clippy::unwrap_used)]
// Integration tests for `GatewayClient` and `WallConnectorClient` using wiremock.

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use flowdash_api::{Error, GatewayClient, TransportConfig, WallConnectorClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, GatewayClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/", server.uri())).unwrap();
    let http = reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap();
    let client = GatewayClient::with_client(http, base_url);
    (server, client)
}

fn password() -> secrecy::SecretString {
    "gateway-password".to_string().into()
}

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_login_success_with_auth_cookie() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/login/Basic"))
        .and(body_partial_json(json!({
            "username": "customer",
            "email": "owner@example.com",
            "password": "gateway-password",
            "force_sm_off": false,
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "AuthCookie=abc123; Path=/")
                .set_body_json(json!({ "token": "abc123" })),
        )
        .mount(&server)
        .await;

    client.login("owner@example.com", &password()).await.unwrap();
}

#[tokio::test]
async fn test_session_cookie_is_sent_after_login() {
    let server = MockServer::start().await;
    let client = GatewayClient::new(&server.uri(), &TransportConfig::default()).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/login/Basic"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("set-cookie", "AuthCookie=abc123; Path=/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/system_status/soe"))
        .and(header("cookie", "AuthCookie=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "percentage": 42.0 })))
        .mount(&server)
        .await;

    client.login("owner@example.com", &password()).await.unwrap();
    let soe = client.get_state_of_energy().await.unwrap();
    assert!((soe.percentage - 42.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_login_without_cookie_is_failure() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/login/Basic"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let result = client.login("owner@example.com", &password()).await;

    assert!(
        matches!(result, Err(Error::MissingSessionCookie { cookie: "AuthCookie" })),
        "expected MissingSessionCookie, got: {result:?}"
    );
}

#[tokio::test]
async fn test_login_with_other_cookie_is_failure() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/login/Basic"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("set-cookie", "UserRecord=xyz; Path=/"),
        )
        .mount(&server)
        .await;

    let result = client.login("owner@example.com", &password()).await;
    assert!(matches!(result, Err(Error::MissingSessionCookie { .. })));
}

#[tokio::test]
async fn test_login_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/login/Basic"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let result = client.login("owner@example.com", &password()).await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

// ── Status tests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_meter_aggregates() {
    let (server, client) = setup().await;

    let body = json!({
        "site": { "instant_power": -1200.5, "energy_imported": 5000.0 },
        "battery": { "instant_power": 800.0, "num_meters_aggregated": 2 },
        "load": { "instant_power": 1500.0 },
        "solar": { "instant_power": 2900.0, "energy_exported": 123456.0 },
        "busway": { "instant_power": 0.0 }
    });

    Mock::given(method("GET"))
        .and(path("/api/meters/aggregates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let meters = client.get_meter_aggregates().await.unwrap();

    assert!((meters.site.instant_power + 1200.5).abs() < f64::EPSILON);
    assert_eq!(meters.battery.num_meters_aggregated, Some(2));
    assert!((meters.solar.energy_exported - 123_456.0).abs() < f64::EPSILON);
    assert_eq!(meters.load.num_meters_aggregated, None);
}

#[tokio::test]
async fn test_state_of_energy_and_grid_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/system_status/soe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "percentage": 81.5 })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/system_status/grid_status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "grid_status": "SystemIslandedActive",
            "grid_services_active": false
        })))
        .mount(&server)
        .await;

    let soe = client.get_state_of_energy().await.unwrap();
    assert!((soe.percentage - 81.5).abs() < f64::EPSILON);

    let grid = client.get_grid_status().await.unwrap();
    assert_eq!(grid.grid_status, "SystemIslandedActive");
}

#[tokio::test]
async fn test_malformed_payload_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/system_status/soe"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let result = client.get_state_of_energy().await;
    assert!(
        matches!(result, Err(Error::Deserialization { ref body, .. }) if body.contains("maintenance")),
        "expected Deserialization error, got: {result:?}"
    );
}

// ── Wall connector tests ────────────────────────────────────────────

#[tokio::test]
async fn test_wall_connector_vitals() {
    let server = MockServer::start().await;
    let client = WallConnectorClient::with_client(
        reqwest::Client::new(),
        Url::parse(&format!("{}/", server.uri())).unwrap(),
    );

    Mock::given(method("GET"))
        .and(path("/api/1/vitals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contactor_closed": true,
            "vehicle_connected": true,
            "session_s": 1200,
            "grid_v": 230.0,
            "grid_hz": 50.0,
            "vehicle_current_a": 16.0,
            "uptime_s": 86400,
            "evse_state": 11,
            "pcba_temp_c": 31.2
        })))
        .mount(&server)
        .await;

    let vitals = client.get_vitals().await.unwrap();
    assert!(vitals.contactor_closed);
    assert_eq!(vitals.session_secs, 1200);
    assert!((vitals.power_watts() - 3680.0).abs() < f64::EPSILON);
}
