// OAuth2 client for the fleet API
//
// Authorization-code flow with client-secret exchange, plus refresh-token
// grants. Building the authorize URL and parsing the redirect are pure;
// only the token endpoint calls touch the network.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Default authorize endpoint (interactive, browser based).
pub const DEFAULT_AUTHORIZE_URL: &str = "https://auth.tesla.com/oauth2/v3/authorize";

/// Default token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://fleet-auth.prd.vn.cloud.tesla.com/oauth2/v3/token";

/// Scopes needed to read energy site data and keep a refresh token.
pub const DEFAULT_SCOPES: &[&str] = &["openid", "offline_access", "energy_device_data"];

/// Static OAuth client registration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub authorize_url: Url,
    pub token_url: Url,
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: Url,
    pub scopes: Vec<String>,
}

/// A prepared authorization attempt: the URL to open and the `state`
/// value the redirect must echo back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub state: String,
}

/// Tokens issued by the token endpoint.
#[derive(Debug, Clone)]
pub struct TokenResponse {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    /// Lifetime of the access token in seconds, if the server sent one.
    pub expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct RawTokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct RawErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Client for the authorize and token endpoints.
pub struct OAuthClient {
    http: reqwest::Client,
    config: OAuthConfig,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, config })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, config: OAuthConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the authorize URL for a new attempt with a fresh random `state`.
    ///
    /// `audience` is the fleet API base URL the token will be valid for.
    pub fn authorization_request(&self, audience: &Url) -> AuthorizationRequest {
        let state = Uuid::new_v4().simple().to_string();
        let mut url = self.config.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", &state)
            .append_pair("audience", audience_str(audience))
            .append_pair("prompt_missing_scopes", "true");
        AuthorizationRequest { url, state }
    }

    /// Extract the authorization code from the redirect URL.
    ///
    /// An `error` parameter is reported as [`Error::OAuth`]. A `state` that
    /// is absent or differs from `expected_state` is rejected, and a missing
    /// `code` is [`Error::AuthorizationCodeMissing`].
    pub fn extract_code(redirect: &Url, expected_state: &str) -> Result<String, Error> {
        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut description = None;

        for (key, value) in redirect.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                "error_description" => description = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = error {
            return Err(Error::OAuth { error, description });
        }
        if state.as_deref() != Some(expected_state) {
            return Err(Error::StateMismatch);
        }
        code.filter(|c| !c.is_empty())
            .ok_or(Error::AuthorizationCodeMissing)
    }

    /// Exchange an authorization code for tokens.
    ///
    /// `POST {token_url}` with `grant_type=authorization_code`.
    pub async fn exchange_code(&self, code: &str, audience: &Url) -> Result<TokenResponse, Error> {
        debug!("exchanging authorization code");
        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
            ("code", code),
            ("audience", audience_str(audience)),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        self.token_request(&form).await
    }

    /// Obtain a fresh access token from a refresh token.
    ///
    /// `POST {token_url}` with `grant_type=refresh_token`.
    pub async fn refresh(&self, refresh_token: &SecretString) -> Result<TokenResponse, Error> {
        debug!("refreshing access token");
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_token.expose_secret()),
        ];
        self.token_request(&form).await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, Error> {
        let resp = self
            .http
            .post(self.config.token_url.clone())
            .form(form)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<RawErrorResponse>(&body) {
                Ok(err) => Error::OAuth {
                    error: err.error,
                    description: err.error_description,
                },
                Err(_) => Error::Api {
                    status: status.as_u16(),
                    message: body,
                },
            });
        }

        let raw: RawTokenResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: String::new(),
            })?;

        Ok(TokenResponse {
            access_token: SecretString::from(raw.access_token),
            refresh_token: raw.refresh_token.map(SecretString::from),
            expires_in: raw.expires_in,
        })
    }
}

/// Audience strings are compared and sent without the trailing slash.
fn audience_str(url: &Url) -> &str {
    url.as_str().trim_end_matches('/')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> OAuthConfig {
        OAuthConfig {
            authorize_url: Url::parse(DEFAULT_AUTHORIZE_URL).unwrap(),
            token_url: Url::parse(DEFAULT_TOKEN_URL).unwrap(),
            client_id: "client-123".into(),
            client_secret: SecretString::from("s3cret".to_string()),
            redirect_uri: Url::parse("https://example.com/callback").unwrap(),
            scopes: DEFAULT_SCOPES.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[test]
    fn authorization_request_carries_state_and_audience() {
        let client = OAuthClient::with_client(reqwest::Client::new(), config());
        let audience = Url::parse("https://fleet-api.prd.eu.vn.cloud.tesla.com/").unwrap();
        let req = client.authorization_request(&audience);

        let pairs: Vec<(String, String)> = req.url.query_pairs().into_owned().collect();
        let get = |k: &str| {
            pairs
                .iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(get("state").as_deref(), Some(req.state.as_str()));
        assert_eq!(
            get("audience").as_deref(),
            Some("https://fleet-api.prd.eu.vn.cloud.tesla.com")
        );
        assert_eq!(get("client_id").as_deref(), Some("client-123"));
        assert_eq!(
            get("scope").as_deref(),
            Some("openid offline_access energy_device_data")
        );
    }

    #[test]
    fn each_attempt_gets_a_new_state() {
        let client = OAuthClient::with_client(reqwest::Client::new(), config());
        let audience = Url::parse("https://fleet.example").unwrap();
        let a = client.authorization_request(&audience);
        let b = client.authorization_request(&audience);
        assert_ne!(a.state, b.state);
    }

    #[test]
    fn extract_code_reads_code_parameter() {
        let url = Url::parse("https://example.com/callback?code=abc&state=xyz").unwrap();
        assert_eq!(OAuthClient::extract_code(&url, "xyz").unwrap(), "abc");
    }

    #[test]
    fn extract_code_without_code_fails() {
        let url = Url::parse("https://example.com/callback?state=xyz").unwrap();
        assert!(matches!(
            OAuthClient::extract_code(&url, "xyz"),
            Err(Error::AuthorizationCodeMissing)
        ));
    }

    #[test]
    fn extract_code_rejects_foreign_state() {
        let url = Url::parse("https://example.com/callback?code=abc&state=other").unwrap();
        assert!(matches!(
            OAuthClient::extract_code(&url, "xyz"),
            Err(Error::StateMismatch)
        ));
    }

    #[test]
    fn extract_code_without_state_is_rejected() {
        let url = Url::parse("https://example.com/callback?code=abc").unwrap();
        assert!(matches!(
            OAuthClient::extract_code(&url, "xyz"),
            Err(Error::StateMismatch)
        ));
    }

    #[test]
    fn extract_code_surfaces_denial() {
        let url =
            Url::parse("https://example.com/callback?error=access_denied&state=xyz").unwrap();
        assert!(matches!(
            OAuthClient::extract_code(&url, "xyz"),
            Err(Error::OAuth { ref error, .. }) if error == "access_denied"
        ));
    }
}
