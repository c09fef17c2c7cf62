// Grid carbon-intensity client (Electricity Maps)
//
// Optional enrichment: latest carbon intensity and fossil-free share of
// the grid mix for a configured zone. Authenticated via `auth-token`.

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::response::decode_json;
use crate::transport::TransportConfig;

pub const DEFAULT_CARBON_API_URL: &str = "https://api.electricitymap.org/";

/// Response of `/v3/carbon-intensity/latest`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarbonIntensity {
    pub zone: String,
    /// gCO2eq/kWh.
    pub carbon_intensity: Option<f64>,
    #[serde(default)]
    pub datetime: Option<String>,
}

/// Response of `/v3/power-breakdown/latest` (only the shares used here).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerBreakdown {
    pub zone: String,
    #[serde(default)]
    pub fossil_free_percentage: Option<f64>,
    #[serde(default)]
    pub renewable_percentage: Option<f64>,
}

pub struct CarbonClient {
    http: reqwest::Client,
    base_url: Url,
}

impl CarbonClient {
    /// Build a client that sends `auth-token` on every request.
    pub fn new(base_url: Url, api_key: &SecretString, transport: &TransportConfig) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut key_value =
            HeaderValue::from_str(api_key.expose_secret()).map_err(|e| Error::Authentication {
                message: format!("invalid API key header value: {e}"),
            })?;
        key_value.set_sensitive(true);
        headers.insert("auth-token", key_value);

        let http = transport.build_client_with_headers(headers)?;
        Ok(Self { http, base_url })
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str, zone: &str) -> Result<T, Error> {
        let url = self.base_url.join(path)?;
        debug!("GET {url} zone={zone}");
        let resp = self
            .http
            .get(url)
            .query(&[("zone", zone)])
            .send()
            .await
            .map_err(Error::Transport)?;
        decode_json(resp).await
    }

    /// `GET /v3/carbon-intensity/latest?zone={zone}`
    pub async fn latest_carbon_intensity(&self, zone: &str) -> Result<CarbonIntensity, Error> {
        self.get("v3/carbon-intensity/latest", zone).await
    }

    /// `GET /v3/power-breakdown/latest?zone={zone}`
    pub async fn latest_power_breakdown(&self, zone: &str) -> Result<PowerBreakdown, Error> {
        self.get("v3/power-breakdown/latest", zone).await
    }
}
