#![allow(clippy::unwrap_used)]
// Integration tests for `FleetClient`, `OAuthClient` and `CarbonClient` using wiremock.

use std::time::Duration;

use chrono::{FixedOffset, TimeZone};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use flowdash_api::fleet::sites::HistoryQuery;
use flowdash_api::{CarbonClient, Error, FleetClient, OAuthClient, OAuthConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, FleetClient) {
    let server = MockServer::start().await;
    let client = FleetClient::with_client(reqwest::Client::new(), Url::parse(&server.uri()).unwrap());
    client.set_access_token(SecretString::from("access-1".to_string()));
    (server, client)
}

fn oauth_config(server: &MockServer) -> OAuthConfig {
    OAuthConfig {
        authorize_url: Url::parse(&format!("{}/oauth2/v3/authorize", server.uri())).unwrap(),
        token_url: Url::parse(&format!("{}/oauth2/v3/token", server.uri())).unwrap(),
        client_id: "client-123".into(),
        client_secret: SecretString::from("s3cret".to_string()),
        redirect_uri: Url::parse("https://example.com/callback").unwrap(),
        scopes: vec!["openid".into(), "offline_access".into()],
    }
}

// ── Fleet endpoints ─────────────────────────────────────────────────

#[tokio::test]
async fn test_requests_carry_bearer_token() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/1/products"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": [
                { "id": 1, "vin": "5YJ3", "display_name": "Car" },
                { "energy_site_id": 42, "site_name": "Home", "resource_type": "battery" }
            ],
            "count": 2
        })))
        .mount(&server)
        .await;

    let products = client.list_products().await.unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products[0].energy_site_id, None);
    assert_eq!(products[1].energy_site_id, Some(42));
    assert_eq!(products[1].site_name.as_deref(), Some("Home"));
}

#[tokio::test]
async fn test_missing_token_fails_without_request() {
    let server = MockServer::start().await;
    let client = FleetClient::with_client(reqwest::Client::new(), Url::parse(&server.uri()).unwrap());

    let result = client.list_products().await;
    assert!(matches!(result, Err(Error::MissingToken)));
}

#[tokio::test]
async fn test_live_status_without_wall_connectors() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/1/energy_sites/42/live_status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {
                "solar_power": 3200,
                "battery_power": -1500,
                "load_power": 1100,
                "grid_power": -600,
                "percentage_charged": 64.2,
                "grid_status": "Active",
                "island_status": "on_grid",
                "timestamp": "2025-03-20T12:00:00+11:00"
            }
        })))
        .mount(&server)
        .await;

    let live = client.live_status(42).await.unwrap();
    assert!(live.wall_connectors.is_empty());
    assert!((live.solar_power - 3200.0).abs() < f64::EPSILON);
    assert_eq!(live.grid_status.as_deref(), Some("Active"));
    assert_eq!(live.percentage_charged, Some(64.2));
}

#[tokio::test]
async fn test_unauthorized_maps_to_authentication() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/1/energy_sites/42/site_info"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .mount(&server)
        .await;

    let result = client.site_info(42).await;
    assert!(
        matches!(result, Err(ref e) if e.is_auth_expired()),
        "expected auth error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_calendar_history_query() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/1/energy_sites/42/calendar_history"))
        .and(query_param("kind", "soe"))
        .and(query_param("period", "day"))
        .and(query_param("time_zone", "Australia/Sydney"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {
                "period": "day",
                "time_series": [
                    { "timestamp": "2025-03-19T00:00:00+11:00", "soe": 55.0 },
                    { "timestamp": "2025-03-19T00:15:00+11:00", "soe": 54.0 }
                ]
            }
        })))
        .mount(&server)
        .await;

    let tz = FixedOffset::east_opt(11 * 3600).unwrap();
    let query = HistoryQuery {
        start: tz.with_ymd_and_hms(2025, 3, 19, 0, 0, 0).unwrap(),
        end: tz.with_ymd_and_hms(2025, 3, 19, 23, 59, 59).unwrap(),
        time_zone: "Australia/Sydney".into(),
    };

    let series = client.soe_history(42, &query).await.unwrap();
    assert_eq!(series.len(), 2);
    assert!((series[1].soe - 54.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_probe_region_against_candidate() {
    let (server, client) = setup().await;
    let other = Url::parse("https://fleet.unused.example").unwrap();
    client.set_base_url(other.clone());

    Mock::given(method("GET"))
        .and(path("/api/1/users/region"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": { "region": "eu", "fleet_api_base_url": "https://fleet-api.prd.eu.vn.cloud.tesla.com" }
        })))
        .mount(&server)
        .await;

    let candidate = Url::parse(&server.uri()).unwrap();
    let region = client
        .probe_region(&candidate, Duration::from_secs(2))
        .await
        .unwrap();

    assert_eq!(region.region.as_deref(), Some("eu"));
    // Probing never moves the client.
    assert_eq!(*client.base_url(), other);
}

// ── OAuth ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_exchange_code() {
    let server = MockServer::start().await;
    let client = OAuthClient::with_client(reqwest::Client::new(), oauth_config(&server));

    Mock::given(method("POST"))
        .and(path("/oauth2/v3/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=the-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "expires_in": 28800,
            "token_type": "Bearer"
        })))
        .mount(&server)
        .await;

    let audience = Url::parse("https://fleet-api.prd.na.vn.cloud.tesla.com").unwrap();
    let tokens = client.exchange_code("the-code", &audience).await.unwrap();

    assert_eq!(tokens.access_token.expose_secret(), "access-1");
    assert_eq!(
        tokens.refresh_token.as_ref().map(|t| t.expose_secret()),
        Some("refresh-1")
    );
    assert_eq!(tokens.expires_in, Some(28800));
}

#[tokio::test]
async fn test_refresh_rejected_is_oauth_error() {
    let server = MockServer::start().await;
    let client = OAuthClient::with_client(reqwest::Client::new(), oauth_config(&server));

    Mock::given(method("POST"))
        .and(path("/oauth2/v3/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "login_required",
            "error_description": "The refresh_token is invalid"
        })))
        .mount(&server)
        .await;

    let result = client
        .refresh(&SecretString::from("stale".to_string()))
        .await;
    assert!(
        matches!(result, Err(Error::OAuth { ref error, .. }) if error == "login_required"),
        "expected OAuth error, got: {result:?}"
    );
}

// ── Carbon intensity ────────────────────────────────────────────────

#[tokio::test]
async fn test_carbon_endpoints() {
    let server = MockServer::start().await;
    let client = CarbonClient::new(
        Url::parse(&format!("{}/", server.uri())).unwrap(),
        &SecretString::from("em-key".to_string()),
        &flowdash_api::TransportConfig::default(),
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/v3/carbon-intensity/latest"))
        .and(query_param("zone", "AU-NSW"))
        .and(header("auth-token", "em-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "zone": "AU-NSW",
            "carbonIntensity": 612,
            "datetime": "2025-03-20T01:00:00.000Z"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v3/power-breakdown/latest"))
        .and(query_param("zone", "AU-NSW"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "zone": "AU-NSW",
            "fossilFreePercentage": 27,
            "renewablePercentage": 26
        })))
        .mount(&server)
        .await;

    let intensity = client.latest_carbon_intensity("AU-NSW").await.unwrap();
    assert_eq!(intensity.carbon_intensity, Some(612.0));

    let breakdown = client.latest_power_breakdown("AU-NSW").await.unwrap();
    assert_eq!(breakdown.fossil_free_percentage, Some(27.0));
}
