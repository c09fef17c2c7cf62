use thiserror::Error;

/// Top-level error type for the `flowdash-api` crate.
///
/// Covers every failure mode across all API surfaces: the local gateway,
/// the wall connector, the cloud fleet API, the OAuth2 endpoints, and the
/// carbon-intensity service. `flowdash-core` maps these into user-facing
/// diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed (wrong credentials, rejected by the gateway, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The gateway answered the login request but did not set its session cookie.
    #[error("Login failed: no {cookie} received")]
    MissingSessionCookie { cookie: &'static str },

    /// The OAuth redirect did not carry a `code` parameter.
    #[error("Authorization code missing from redirect")]
    AuthorizationCodeMissing,

    /// The OAuth redirect carried a `state` that does not match the request.
    #[error("OAuth state mismatch -- the redirect belongs to a different login attempt")]
    StateMismatch,

    /// The authorization server denied the request or rejected a grant.
    #[error("OAuth error: {error}{}", description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    OAuth {
        error: String,
        description: Option<String>,
    },

    /// No access token is installed on a client that requires one.
    #[error("No access token -- authorization required")]
    MissingToken,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── API ─────────────────────────────────────────────────────────
    /// Non-success HTTP status from any of the JSON APIs.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates the credential is no longer
    /// accepted and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        match self {
            Self::Authentication { .. } | Self::MissingSessionCookie { .. } | Self::MissingToken => {
                true
            }
            Self::Api { status, .. } => *status == 401,
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// HTTP status code attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
