// ── Core error types ──
//
// User-facing errors from flowdash-core. Consumers never see raw HTTP
// status codes or JSON parse failures; the `From<flowdash_api::Error>`
// impl translates transport-layer errors into domain variants, and
// `ErrorKind` groups them into the four recoverable failure classes.

use strum::Display;
use thiserror::Error;

/// Coarse classification of a [`CoreError`].
///
/// Every kind is recoverable: the client records the error, keeps the
/// last good snapshot, and retries on the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ErrorKind {
    /// Network, TLS or timeout failure.
    Transport,
    /// Missing credential, rejected login, missing session cookie, OAuth denial.
    Authentication,
    /// Unexpected payload shape.
    Decode,
    /// Missing host, site or setting, or a request the server rejected.
    Configuration,
}

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// `timeout_secs` is `None` when the limit came from the shared
    /// client rather than the request.
    #[error("Request timed out{}", timeout_secs.map(|s| format!(" after {s}s")).unwrap_or_default())]
    Timeout { timeout_secs: Option<u64> },

    // ── Authentication errors ────────────────────────────────────────
    #[error("Login failed: {message}")]
    LoginFailed { message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Authorization required -- run `flowdash login`")]
    AuthorizationRequired,

    #[error("Authorization code missing")]
    AuthorizationCodeMissing,

    #[error("Authorization denied: {error}{}", description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    AuthorizationDenied {
        error: String,
        description: Option<String>,
    },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Unexpected response: {message}")]
    Decode { message: String },

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("No energy site selected")]
    NoSiteSelected,

    #[error("Failed to persist settings: {message}")]
    Persistence { message: String },
}

impl CoreError {
    /// Which of the four failure classes this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => ErrorKind::Transport,
            Self::Api { status, .. } if *status >= 500 || *status == 408 || *status == 429 => {
                ErrorKind::Transport
            }
            Self::LoginFailed { .. }
            | Self::AuthenticationFailed { .. }
            | Self::AuthorizationRequired
            | Self::AuthorizationCodeMissing
            | Self::AuthorizationDenied { .. } => ErrorKind::Authentication,
            Self::Decode { .. } => ErrorKind::Decode,
            // Remaining 4xx: the request itself was wrong (unknown site, bad path).
            Self::Api { .. }
            | Self::Config { .. }
            | Self::NoSiteSelected
            | Self::Persistence { .. } => ErrorKind::Configuration,
        }
    }

    /// Returns `true` if the stored credential was rejected and a fresh
    /// authorization might help.
    pub fn is_auth(&self) -> bool {
        self.kind() == ErrorKind::Authentication
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<flowdash_api::Error> for CoreError {
    fn from(err: flowdash_api::Error) -> Self {
        use flowdash_api::Error as ApiError;

        match err {
            ApiError::Authentication { message } => CoreError::AuthenticationFailed { message },
            ApiError::MissingSessionCookie { cookie } => CoreError::LoginFailed {
                message: format!("no {cookie} received"),
            },
            ApiError::AuthorizationCodeMissing => CoreError::AuthorizationCodeMissing,
            e @ ApiError::StateMismatch => CoreError::AuthenticationFailed {
                message: e.to_string(),
            },
            ApiError::OAuth { error, description } => {
                CoreError::AuthorizationDenied { error, description }
            }
            ApiError::MissingToken => CoreError::AuthorizationRequired,
            ApiError::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: None }
                } else if e.is_decode() {
                    CoreError::Decode {
                        message: e.to_string(),
                    }
                } else {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                }
            }
            ApiError::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ApiError::Timeout { timeout_secs } => CoreError::Timeout {
                timeout_secs: Some(timeout_secs),
            },
            ApiError::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            // The gateway answers an expired session cookie with 403.
            ApiError::Api {
                status: 401 | 403,
                message,
            } => CoreError::AuthenticationFailed { message },
            ApiError::Api { status, message } => CoreError::Api { status, message },
            ApiError::Deserialization { message, .. } => CoreError::Decode { message },
        }
    }
}
