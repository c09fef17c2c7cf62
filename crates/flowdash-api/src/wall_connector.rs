// Wall connector API client
//
// The EV wall connector is a separate device on the local network with
// its own unauthenticated HTTP API. Only the vitals endpoint is used.

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::response::decode_json;
use crate::transport::TransportConfig;

/// Live electrical readings from `GET /api/1/vitals`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Vitals {
    #[serde(default)]
    pub contactor_closed: bool,
    #[serde(default)]
    pub vehicle_connected: bool,
    /// Seconds into the current charging session.
    #[serde(default, rename = "session_s")]
    pub session_secs: u64,
    #[serde(default, rename = "grid_v")]
    pub grid_volts: f64,
    #[serde(default, rename = "grid_hz")]
    pub grid_hertz: f64,
    #[serde(default, rename = "vehicle_current_a")]
    pub vehicle_current_amps: f64,
    #[serde(default, rename = "uptime_s")]
    pub uptime_secs: u64,
    #[serde(default)]
    pub evse_state: u32,
}

impl Vitals {
    /// Instantaneous charging power in watts: volts × amps, no power-factor
    /// correction.
    pub fn power_watts(&self) -> f64 {
        self.grid_volts * self.vehicle_current_amps
    }
}

/// Raw HTTP client for a wall connector.
pub struct WallConnectorClient {
    http: reqwest::Client,
    base_url: Url,
}

impl WallConnectorClient {
    /// Create a client for the wall connector at `host`.
    ///
    /// A bare host is reached over plain HTTP; the device does not serve TLS.
    pub fn new(host: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let host = host.trim().trim_end_matches('/');
        let raw = if host.contains("://") {
            format!("{host}/")
        } else {
            format!("http://{host}/")
        };
        let base_url = Url::parse(&raw)?;
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The device base URL, also used as its identifier.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET /api/1/vitals`
    pub async fn get_vitals(&self) -> Result<Vitals, Error> {
        let url = self.base_url.join("api/1/vitals")?;
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        decode_json(resp).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn power_is_volts_times_amps() {
        let vitals = Vitals {
            contactor_closed: true,
            vehicle_connected: true,
            session_secs: 1,
            grid_volts: 230.0,
            grid_hertz: 50.0,
            vehicle_current_amps: 16.0,
            uptime_secs: 10,
            evse_state: 2,
        };
        assert!((vitals.power_watts() - 3680.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bare_host_uses_plain_http() {
        let client =
            WallConnectorClient::new("192.168.1.60", &TransportConfig::default()).unwrap();
        assert_eq!(client.base_url().as_str(), "http://192.168.1.60/");
    }
}
