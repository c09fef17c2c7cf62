//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use flowdash_config::ConfigError;
use flowdash_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(flowdash::connection_failed),
        help(
            "Check that the gateway is powered and reachable from this machine.\n\
             {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out{}", seconds.map(|s| format!(" after {s}s")).unwrap_or_default())]
    #[diagnostic(
        code(flowdash::timeout),
        help("Increase timeout with --timeout or check the network path to the gateway.")
    )]
    Timeout { seconds: Option<u64> },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Gateway login failed: {message}")]
    #[diagnostic(
        code(flowdash::login_failed),
        help(
            "Verify the account e-mail and gateway password.\n\
             Run: flowdash config set-secret password"
        )
    )]
    LoginFailed { message: String },

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(flowdash::auth_failed),
        help("The stored session was rejected. Run: flowdash login")
    )]
    AuthFailed { message: String },

    #[error("Not signed in")]
    #[diagnostic(
        code(flowdash::authorization_required),
        help("Run: flowdash login")
    )]
    AuthorizationRequired,

    #[error("Authorization did not complete: {message}")]
    #[diagnostic(
        code(flowdash::authorization_failed),
        help(
            "Open the printed URL, approve access, then paste the full URL \
             your browser was redirected to."
        )
    )]
    AuthorizationFailed { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(flowdash::no_credentials),
        help(
            "Configure credentials with: flowdash config init\n\
             Or set FLOWDASH_PASSWORD / FLOWDASH_CLIENT_SECRET."
        )
    )]
    NoCredentials { profile: String },

    // ── Data ─────────────────────────────────────────────────────────
    #[error("API error: {message}")]
    #[diagnostic(code(flowdash::api_error))]
    ApiError { message: String },

    #[error("No energy site available")]
    #[diagnostic(
        code(flowdash::no_site),
        help("Run: flowdash sites list")
    )]
    NoSite,

    #[error("Nothing to show yet")]
    #[diagnostic(
        code(flowdash::no_data),
        help("The first fetch returned no data. Retry with -v for details.")
    )]
    NoData,

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(flowdash::validation))]
    Validation { field: String, reason: String },

    #[error("{message}")]
    #[diagnostic(code(flowdash::unsupported))]
    Unsupported { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(flowdash::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: flowdash config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No energy system configured")]
    #[diagnostic(
        code(flowdash::no_config),
        help(
            "Create a profile with: flowdash config init\n\
             Expected at: {path}\n\
             Or pass --host (use --host demo for sample data)."
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(flowdash::config))]
    Config { message: String },

    #[error("Could not save session state: {message}")]
    #[diagnostic(code(flowdash::persistence))]
    Persistence { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(flowdash::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    #[diagnostic(code(flowdash::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::LoginFailed { .. }
            | Self::AuthFailed { .. }
            | Self::AuthorizationRequired
            | Self::AuthorizationFailed { .. }
            | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NoSite | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::Unsupported { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::LoginFailed { message } => CliError::LoginFailed { message },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::AuthorizationRequired => CliError::AuthorizationRequired,
            err @ (CoreError::AuthorizationCodeMissing | CoreError::AuthorizationDenied { .. }) => {
                CliError::AuthorizationFailed {
                    message: err.to_string(),
                }
            }
            err @ (CoreError::Decode { .. } | CoreError::Api { .. }) => CliError::ApiError {
                message: err.to_string(),
            },
            CoreError::Config { message } => CliError::Unsupported { message },
            CoreError::NoSiteSelected => CliError::NoSite,
            CoreError::Persistence { message } => CliError::Persistence { message },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_exit_with_auth_code() {
        let err = CliError::from(CoreError::LoginFailed {
            message: "no AuthCookie received".into(),
        });
        assert_eq!(err.exit_code(), exit_code::AUTH);
        assert_eq!(
            CliError::from(CoreError::AuthorizationRequired).exit_code(),
            exit_code::AUTH
        );
    }

    #[test]
    fn transport_errors_keep_their_codes() {
        let err = CliError::from(CoreError::ConnectionFailed {
            url: "https://192.168.1.50".into(),
            reason: "connection refused".into(),
        });
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
        assert_eq!(
            CliError::from(CoreError::Timeout {
                timeout_secs: Some(5)
            })
            .exit_code(),
            exit_code::TIMEOUT
        );
    }

    #[test]
    fn cloud_only_operations_are_usage_errors() {
        let err = CliError::from(CoreError::Config {
            message: "site selection is only available in cloud mode".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
        assert!(err.to_string().contains("cloud mode"));
    }
}
