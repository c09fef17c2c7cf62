//! Shared configuration for flowdash.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! translation to `flowdash_core::ClientConfig`, and the file-backed
//! [`SettingsStore`](flowdash_core::SettingsStore) that keeps tokens and
//! the selected site between runs. The CLI adds flag-aware wrappers on top.

mod state;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use flowdash_core::{
    CarbonSettings, ClientConfig, CloudCredentials, Credentials, LoginMode, TlsVerification,
};

pub use state::{FileSettingsStore, TokenStorage, state_path};

/// Keyring service name for every stored secret.
pub const KEYRING_SERVICE: &str = "flowdash";

const DEFAULT_CARBON_BASE_URL: &str = "https://api.electricitymap.org/";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named energy systems.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Live snapshot cadence in seconds.
    #[serde(default = "default_fast_interval")]
    pub fast_interval: u64,

    /// Daily energy cadence in seconds.
    #[serde(default = "default_slow_interval")]
    pub slow_interval: u64,

    /// Carbon data cadence in seconds.
    #[serde(default = "default_carbon_interval")]
    pub carbon_interval: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            fast_interval: default_fast_interval(),
            slow_interval: default_slow_interval(),
            carbon_interval: default_carbon_interval(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_fast_interval() -> u64 {
    10
}
fn default_slow_interval() -> u64 {
    60
}
fn default_carbon_interval() -> u64 {
    900
}

/// One energy system.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// `local` (gateway on the home network) or `cloud` (fleet API).
    #[serde(default)]
    pub mode: LoginMode,

    /// Gateway host or URL. `demo` shows built-in sample data.
    pub host: Option<String>,

    /// Account e-mail used for the gateway login.
    pub username: Option<String>,

    /// Gateway password (plaintext -- prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the gateway password.
    pub password_env: Option<String>,

    /// Optional wall connector on the local network.
    pub wall_connector_host: Option<String>,

    /// OAuth client registration for cloud mode.
    pub client_id: Option<String>,

    /// OAuth client secret (plaintext -- prefer keyring or env var).
    pub client_secret: Option<String>,

    /// Environment variable name containing the client secret.
    pub client_secret_env: Option<String>,

    pub redirect_uri: Option<String>,

    /// Override the authorize endpoint.
    pub authorize_url: Option<String>,

    /// Override the token endpoint.
    pub token_url: Option<String>,

    /// Fleet API host used before region discovery.
    pub fleet_base_url: Option<String>,

    /// IANA zone for day boundaries (e.g. "Australia/Sydney").
    pub time_zone: Option<String>,

    /// Electricity Maps zone (e.g. "AU-NSW"). Enables carbon data.
    pub carbon_zone: Option<String>,

    /// Electricity Maps API key (plaintext -- prefer keyring or env var).
    pub carbon_api_key: Option<String>,

    /// Environment variable name containing the Electricity Maps key.
    pub carbon_api_key_env: Option<String>,

    /// Override the Electricity Maps endpoint.
    pub carbon_base_url: Option<String>,

    /// Path to custom CA certificate for cloud endpoints.
    pub ca_cert: Option<PathBuf>,

    /// Accept invalid certificates on cloud endpoints.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// Keep OAuth tokens in the state file instead of the keyring.
    pub plaintext_tokens: Option<bool>,
}

impl Profile {
    pub fn token_storage(&self) -> TokenStorage {
        if self.plaintext_tokens.unwrap_or(false) {
            TokenStorage::StateFile
        } else {
            TokenStorage::Keyring
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "flowdash", "flowdash")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("flowdash");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the Config from `path` merged with `FLOWDASH_` environment
/// variables (`FLOWDASH_DEFAULTS__TIMEOUT=5`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("FLOWDASH_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, to_toml(cfg)?)?;
    Ok(())
}

/// Render `cfg` the way it is written to disk.
pub fn to_toml(cfg: &Config) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(cfg)?)
}

// ── Credential resolution ───────────────────────────────────────────

/// A secret kept in the system keyring, per profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    GatewayPassword,
    ClientSecret,
    CarbonApiKey,
}

impl SecretKind {
    fn account(self, profile_name: &str) -> String {
        let suffix = match self {
            Self::GatewayPassword => "password",
            Self::ClientSecret => "client-secret",
            Self::CarbonApiKey => "carbon-api-key",
        };
        format!("{profile_name}/{suffix}")
    }

    fn default_env(self) -> &'static str {
        match self {
            Self::GatewayPassword => "FLOWDASH_PASSWORD",
            Self::ClientSecret => "FLOWDASH_CLIENT_SECRET",
            Self::CarbonApiKey => "FLOWDASH_CARBON_API_KEY",
        }
    }
}

/// Store a secret in the system keyring.
pub fn store_secret(profile_name: &str, kind: SecretKind, value: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &kind.account(profile_name))?;
    entry.set_password(value)?;
    Ok(())
}

/// Resolve a secret: named env var → default env var → keyring → plaintext.
fn resolve_secret(
    kind: SecretKind,
    env_name: Option<&str>,
    plaintext: Option<&str>,
    profile_name: &str,
) -> Option<SecretString> {
    // 1. Env vars
    for name in env_name.into_iter().chain([kind.default_env()]) {
        if let Ok(val) = std::env::var(name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &kind.account(profile_name)) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    plaintext.map(|p| SecretString::from(p.to_owned()))
}

/// Resolve the gateway login (username + password).
pub fn resolve_local_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<(String, SecretString), ConfigError> {
    let username = profile
        .username
        .clone()
        .or_else(|| std::env::var("FLOWDASH_USERNAME").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    let password = resolve_secret(
        SecretKind::GatewayPassword,
        profile.password_env.as_deref(),
        profile.password.as_deref(),
        profile_name,
    )
    .ok_or_else(|| ConfigError::NoCredentials {
        profile: profile_name.into(),
    })?;

    Ok((username, password))
}

/// Resolve the OAuth client registration for cloud mode.
pub fn resolve_cloud_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<CloudCredentials, ConfigError> {
    let client_id = profile
        .client_id
        .clone()
        .or_else(|| std::env::var("FLOWDASH_CLIENT_ID").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    let client_secret = resolve_secret(
        SecretKind::ClientSecret,
        profile.client_secret_env.as_deref(),
        profile.client_secret.as_deref(),
        profile_name,
    )
    .ok_or_else(|| ConfigError::NoCredentials {
        profile: profile_name.into(),
    })?;

    let redirect_uri = parse_url(
        "redirect_uri",
        profile.redirect_uri.as_deref().ok_or_else(|| ConfigError::Validation {
            field: "redirect_uri".into(),
            reason: "required in cloud mode".into(),
        })?,
    )?;

    let mut credentials = CloudCredentials::new(client_id, client_secret, redirect_uri)
        .map_err(|e| ConfigError::Validation {
            field: "oauth endpoints".into(),
            reason: e.to_string(),
        })?;
    if let Some(ref raw) = profile.authorize_url {
        credentials.authorize_url = parse_url("authorize_url", raw)?;
    }
    if let Some(ref raw) = profile.token_url {
        credentials.token_url = parse_url("token_url", raw)?;
    }
    Ok(credentials)
}

/// Resolve carbon enrichment settings; `None` when no zone is configured.
pub fn resolve_carbon(
    profile: &Profile,
    profile_name: &str,
) -> Result<Option<CarbonSettings>, ConfigError> {
    let Some(zone) = profile.carbon_zone.clone() else {
        return Ok(None);
    };
    let api_key = resolve_secret(
        SecretKind::CarbonApiKey,
        profile.carbon_api_key_env.as_deref(),
        profile.carbon_api_key.as_deref(),
        profile_name,
    )
    .ok_or_else(|| ConfigError::NoCredentials {
        profile: profile_name.into(),
    })?;

    Ok(Some(CarbonSettings {
        api_key,
        zone,
        base_url: parse_url(
            "carbon_base_url",
            profile
                .carbon_base_url
                .as_deref()
                .unwrap_or(DEFAULT_CARBON_BASE_URL),
        )?,
    }))
}

/// Resolve `Credentials` from a profile's `mode`.
pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<Credentials, ConfigError> {
    match profile.mode {
        LoginMode::Local => {
            let host = profile.host.clone().ok_or_else(|| ConfigError::Validation {
                field: "host".into(),
                reason: "required in local mode".into(),
            })?;
            if host.trim().eq_ignore_ascii_case(flowdash_core::DEMO_HOST) {
                return Ok(Credentials::Local {
                    host,
                    username: String::new(),
                    password: SecretString::from(String::new()),
                });
            }
            let (username, password) = resolve_local_credentials(profile, profile_name)?;
            Ok(Credentials::Local {
                host,
                username,
                password,
            })
        }
        LoginMode::Cloud => Ok(Credentials::Cloud(resolve_cloud_credentials(
            profile,
            profile_name,
        )?)),
    }
}

/// Parse an IANA time zone name.
pub fn parse_time_zone(raw: &str) -> Result<Tz, ConfigError> {
    raw.parse::<Tz>().map_err(|e| ConfigError::Validation {
        field: "time_zone".into(),
        reason: e.to_string(),
    })
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}

/// Build a `ClientConfig` from a profile -- no CLI flag overrides.
pub fn profile_to_client_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    let credentials = resolve_credentials(profile, profile_name)?;
    let mut config = ClientConfig::new(credentials);

    config.wall_connector_host.clone_from(&profile.wall_connector_host);
    if let Some(ref raw) = profile.fleet_base_url {
        config.fleet_base_url = parse_url("fleet_base_url", raw)?;
    }

    config.tls = if profile.insecure.unwrap_or(false) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.fast_interval = Duration::from_secs(defaults.fast_interval);
    config.slow_interval = Duration::from_secs(defaults.slow_interval);
    config.carbon_interval = Duration::from_secs(defaults.carbon_interval);

    if let Some(ref zone) = profile.time_zone {
        config.time_zone = parse_time_zone(zone)?;
    }
    config.carbon = resolve_carbon(profile, profile_name)?;

    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.fast_interval, 10);
        assert_eq!(cfg.defaults.carbon_interval, 900);
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn profiles_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"
default_profile = "home"

[defaults]
timeout = 5

[profiles.home]
mode = "local"
host = "192.168.1.50"
username = "owner@example.com"
password = "hunter2"
wall_connector_host = "192.168.1.60"
time_zone = "Australia/Sydney"

[profiles.cabin]
mode = "cloud"
client_id = "abc"
client_secret = "shh"
redirect_uri = "https://example.com/callback"
"#,
        );

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("home"));
        assert_eq!(cfg.defaults.timeout, 5);
        assert_eq!(cfg.profiles["home"].mode, LoginMode::Local);
        assert_eq!(cfg.profiles["cabin"].mode, LoginMode::Cloud);

        let home = profile_to_client_config(&cfg.profiles["home"], "home", &cfg.defaults).unwrap();
        assert_eq!(home.mode(), LoginMode::Local);
        assert_eq!(home.timeout, Duration::from_secs(5));
        assert_eq!(home.wall_connector_host.as_deref(), Some("192.168.1.60"));
        assert_eq!(home.time_zone, chrono_tz::Australia::Sydney);
    }

    #[test]
    fn demo_host_needs_no_credentials() {
        let profile = Profile {
            host: Some("demo".into()),
            ..Profile::default()
        };
        let config = profile_to_client_config(&profile, "demo", &Defaults::default()).unwrap();
        assert!(config.credentials.is_demo());
    }

    #[test]
    fn cloud_profile_requires_redirect_uri() {
        let profile = Profile {
            mode: LoginMode::Cloud,
            client_id: Some("abc".into()),
            client_secret: Some("shh".into()),
            ..Profile::default()
        };
        let err = resolve_cloud_credentials(&profile, "cloud").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "redirect_uri"));
    }

    #[test]
    fn invalid_time_zone_is_rejected() {
        assert!(matches!(
            parse_time_zone("Mars/Olympus"),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn config_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.profiles.insert(
            "home".into(),
            Profile {
                host: Some("demo".into()),
                ..Profile::default()
            },
        );
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profiles["home"].host.as_deref(), Some("demo"));
    }
}
