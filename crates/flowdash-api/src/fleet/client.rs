// Fleet API HTTP client
//
// Wraps `reqwest::Client` with bearer-token injection, envelope unwrapping,
// and a swappable base URL (the authoritative regional host is only known
// after region discovery).

use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::fleet::models::FleetResponse;
use crate::response::decode_json;
use crate::transport::TransportConfig;

/// Raw HTTP client for the fleet API.
///
/// The access token and base URL can be replaced at any time from any
/// task; in-flight requests keep the values they started with.
pub struct FleetClient {
    http: reqwest::Client,
    base_url: ArcSwap<Url>,
    access_token: ArcSwapOption<SecretString>,
}

impl FleetClient {
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a fleet client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: ArcSwap::from_pointee(base_url),
            access_token: ArcSwapOption::empty(),
        }
    }

    /// The base URL requests currently go to.
    pub fn base_url(&self) -> Arc<Url> {
        self.base_url.load_full()
    }

    /// Point subsequent requests at a different regional host.
    pub fn set_base_url(&self, url: Url) {
        debug!(%url, "fleet base URL updated");
        self.base_url.store(Arc::new(url));
    }

    /// Install the bearer token used for all requests.
    pub fn set_access_token(&self, token: SecretString) {
        self.access_token.store(Some(Arc::new(token)));
    }

    pub fn clear_access_token(&self) {
        self.access_token.store(None);
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token.load().is_some()
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn bearer(&self) -> Result<Arc<SecretString>, Error> {
        self.access_token.load_full().ok_or(Error::MissingToken)
    }

    /// GET `{base}/{path}` and unwrap the response envelope.
    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let base = self.base_url();
        self.get_from(&base, path, &[], None).await
    }

    /// GET with query parameters against the current base URL.
    pub(crate) async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        let base = self.base_url();
        self.get_from(&base, path, params, None).await
    }

    /// GET against an explicit base URL, optionally with a per-request timeout.
    pub(crate) async fn get_from<T: DeserializeOwned>(
        &self,
        base: &Url,
        path: &str,
        params: &[(&str, String)],
        timeout: Option<std::time::Duration>,
    ) -> Result<T, Error> {
        let token = self.bearer()?;
        let url = join(base, path)?;
        debug!("GET {url} params={params:?}");

        let mut builder = self
            .http
            .get(url)
            .bearer_auth(token.expose_secret())
            .query(params);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let resp = builder.send().await.map_err(|e| match timeout {
            Some(t) if e.is_timeout() => Error::Timeout {
                timeout_secs: t.as_secs(),
            },
            _ => Error::Transport(e),
        })?;
        let envelope: FleetResponse<T> = decode_json(resp).await?;
        Ok(envelope.response)
    }
}

/// Join a relative API path onto a base that may or may not end in `/`.
fn join(base: &Url, path: &str) -> Result<Url, Error> {
    let base = base.as_str().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    Ok(Url::parse(&format!("{base}/{path}"))?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn join_handles_trailing_slashes() {
        let a = Url::parse("https://fleet.example/").unwrap();
        let b = Url::parse("https://fleet.example").unwrap();
        assert_eq!(
            join(&a, "/api/1/products").unwrap(),
            join(&b, "api/1/products").unwrap()
        );
    }

    #[test]
    fn token_can_be_installed_and_cleared() {
        let client =
            FleetClient::with_client(reqwest::Client::new(), Url::parse("https://f.example").unwrap());
        assert!(!client.has_access_token());
        client.set_access_token(SecretString::from("t".to_string()));
        assert!(client.has_access_token());
        client.clear_access_token();
        assert!(!client.has_access_token());
    }
}
