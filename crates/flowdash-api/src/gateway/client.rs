// Local gateway HTTP client
//
// Wraps `reqwest::Client` with gateway URL construction and a cookie
// jar. Endpoint groups (auth, status) are implemented as inherent
// methods in separate files to keep this module focused on transport.

use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::response::decode_json;
use crate::transport::TransportConfig;

/// Raw HTTP client for the local gateway API.
///
/// The gateway serves a self-signed certificate, so the default transport
/// accepts invalid certificates. The session cookie set by
/// [`login`](Self::login) lives in the client's cookie jar and is sent on
/// every following request.
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: Url,
}

impl GatewayClient {
    /// Create a gateway client for `host` (e.g. `192.168.1.50`).
    ///
    /// A bare host is turned into `https://{host}/`; a full URL is used
    /// as-is. If the transport has no cookie jar, one is created.
    pub fn new(host: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(host)?;
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let http = config.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a gateway client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn normalize_base_url(host: &str) -> Result<Url, Error> {
        let host = host.trim().trim_end_matches('/');
        let raw = if host.contains("://") {
            format!("{host}/")
        } else {
            format!("https://{host}/")
        };
        Ok(Url::parse(&raw)?)
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL for a gateway API path (`api/...`).
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the JSON body.
    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.api_url(path)?;
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
    fn bare_host_becomes_https_root() {
        let url = GatewayClient::normalize_base_url("192.168.1.50").unwrap();
        assert_eq!(url.as_str(), "https://192.168.1.50/");
    }

    #[test]
    fn explicit_scheme_is_kept() {
        let url = GatewayClient::normalize_base_url("http://127.0.0.1:8080/").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/");
        assert_eq!(
            GatewayClient::with_client(reqwest::Client::new(), url)
                .api_url("api/meters/aggregates")
                .unwrap()
                .as_str(),
            "http://127.0.0.1:8080/api/meters/aggregates"
        );
    }
}
