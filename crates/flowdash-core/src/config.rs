// ── Runtime client configuration ──
//
// These types describe *what* to connect to and *how often* to poll.
// They carry credential data and tuning, but never touch disk. The CLI
// builds a `ClientConfig` (usually via flowdash-config) and hands it in.

use std::time::Duration;

use chrono_tz::Tz;
use flowdash_api::fleet::REGIONAL_BASE_URLS;
use flowdash_api::oauth::{DEFAULT_AUTHORIZE_URL, DEFAULT_SCOPES, DEFAULT_TOKEN_URL};
use flowdash_api::{OAuthConfig, TlsMode};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::Display;
use url::Url;

/// Gateway host that selects the built-in demo data instead of a device.
pub const DEMO_HOST: &str = "demo";

/// Margin (W) below which a flow counts as idle, and by which grid charge
/// must beat solar before the battery is considered grid-charged.
pub const HYSTERESIS_WATTS: f64 = 10.0;

/// Fleet API host used before region discovery (North America).
pub const DEFAULT_FLEET_BASE_URL: &str = "https://fleet-api.prd.na.vn.cloud.tesla.com";

/// Which data source is active. Exactly one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LoginMode {
    #[default]
    Local,
    Cloud,
}

/// Registration of the OAuth client used in cloud mode.
#[derive(Debug, Clone)]
pub struct CloudCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: Url,
    pub authorize_url: Url,
    pub token_url: Url,
    pub scopes: Vec<String>,
}

impl CloudCredentials {
    /// Credentials against the default authorize/token endpoints.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: SecretString,
        redirect_uri: Url,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            client_id: client_id.into(),
            client_secret,
            redirect_uri,
            authorize_url: Url::parse(DEFAULT_AUTHORIZE_URL)?,
            token_url: Url::parse(DEFAULT_TOKEN_URL)?,
            scopes: DEFAULT_SCOPES.iter().map(|s| (*s).to_owned()).collect(),
        })
    }

    pub(crate) fn oauth_config(&self) -> OAuthConfig {
        OAuthConfig {
            authorize_url: self.authorize_url.clone(),
            token_url: self.token_url.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            redirect_uri: self.redirect_uri.clone(),
            scopes: self.scopes.clone(),
        }
    }
}

/// Credential data for the active mode.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Cookie login against the on-site gateway.
    Local {
        host: String,
        /// Account e-mail, sent as the `email` field of the login body.
        username: String,
        password: SecretString,
    },
    /// OAuth2 against the regional fleet API.
    Cloud(CloudCredentials),
}

impl Credentials {
    pub fn mode(&self) -> LoginMode {
        match self {
            Self::Local { .. } => LoginMode::Local,
            Self::Cloud(_) => LoginMode::Cloud,
        }
    }

    /// `true` for the synthetic demo source.
    pub fn is_demo(&self) -> bool {
        matches!(self, Self::Local { host, .. } if host.trim().eq_ignore_ascii_case(DEMO_HOST))
    }
}

/// TLS verification strategy for cloud endpoints. The local gateway and
/// wall connector always accept their self-signed certificates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    #[default]
    SystemDefaults,
    CustomCa(std::path::PathBuf),
    DangerAcceptInvalid,
}

impl TlsVerification {
    pub(crate) fn to_transport(&self) -> TlsMode {
        match self {
            Self::SystemDefaults => TlsMode::System,
            Self::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            Self::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }
}

/// Electricity Maps enrichment settings.
#[derive(Debug, Clone)]
pub struct CarbonSettings {
    pub api_key: SecretString,
    /// Grid zone, e.g. `AU-NSW`.
    pub zone: String,
    pub base_url: Url,
}

/// Configuration for one [`EnergySourceClient`](crate::EnergySourceClient).
///
/// Built by the CLI, passed in at construction -- core never reads config
/// files. Mutable state that must survive a restart goes through the
/// [`SettingsStore`](crate::SettingsStore) port instead.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub credentials: Credentials,
    /// Optional wall connector on the local network.
    pub wall_connector_host: Option<String>,
    /// Fleet API host used until region discovery says otherwise.
    pub fleet_base_url: Url,
    /// Regional hosts raced during discovery.
    pub region_candidates: Vec<Url>,
    pub region_probe_timeout: Duration,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Live snapshot + wall connector cadence.
    pub fast_interval: Duration,
    /// Daily energy cadence.
    pub slow_interval: Duration,
    /// Carbon-intensity cadence.
    pub carbon_interval: Duration,
    /// Zone used for day boundaries and history windows.
    pub time_zone: Tz,
    pub carbon: Option<CarbonSettings>,
}

impl ClientConfig {
    /// Defaults for everything except the credentials.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            wall_connector_host: None,
            fleet_base_url: default_fleet_base_url(),
            region_candidates: REGIONAL_BASE_URLS
                .iter()
                .filter_map(|u| Url::parse(u).ok())
                .collect(),
            region_probe_timeout: Duration::from_secs(2),
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            fast_interval: Duration::from_secs(10),
            slow_interval: Duration::from_secs(60),
            carbon_interval: Duration::from_secs(900),
            time_zone: Tz::UTC,
            carbon: None,
        }
    }

    pub fn mode(&self) -> LoginMode {
        self.credentials.mode()
    }
}

fn default_fleet_base_url() -> Url {
    Url::parse(DEFAULT_FLEET_BASE_URL).expect("default fleet URL is valid")
}
