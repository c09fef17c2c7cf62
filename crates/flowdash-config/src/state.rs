// ── File-backed settings store ──
//
// Persisted client state lives in one TOML file per profile under the
// platform data dir. Tokens go to the system keyring unless the caller
// opts into keeping them in the file.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use flowdash_core::{CoreError, DisplayPrefs, LoginMode, PersistedState, SettingsStore};

use crate::KEYRING_SERVICE;

/// Where access and refresh tokens are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenStorage {
    #[default]
    Keyring,
    /// Plaintext in the state file. For hosts without a keyring daemon.
    StateFile,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct StateFile {
    login_mode: LoginMode,
    gateway_host: Option<String>,
    wall_connector_host: Option<String>,
    username: Option<String>,
    fleet_base_url: Option<Url>,
    token_expires_at: Option<DateTime<Utc>>,
    token_audience: Option<Url>,
    selected_site_index: usize,
    access_token: Option<String>,
    refresh_token: Option<String>,
    display: DisplayPrefs,
}

/// Default state file for `profile`.
pub fn state_path(profile: &str) -> PathBuf {
    let base = crate::project_dirs().map_or_else(
        || crate::dirs_fallback().join("state"),
        |dirs| dirs.data_dir().join("state"),
    );
    base.join(format!("{profile}.toml"))
}

/// [`SettingsStore`] over a TOML file and (optionally) the keyring.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    profile: String,
    tokens: TokenStorage,
    lock: Mutex<()>,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>, profile: impl Into<String>, tokens: TokenStorage) -> Self {
        Self {
            path: path.into(),
            profile: profile.into(),
            tokens,
            lock: Mutex::new(()),
        }
    }

    /// Store for `profile` at its default location.
    pub fn for_profile(profile: &str, tokens: TokenStorage) -> Self {
        Self::new(state_path(profile), profile, tokens)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>, CoreError> {
        self.lock.lock().map_err(|_| CoreError::Persistence {
            message: "state file lock poisoned".into(),
        })
    }

    fn read(&self) -> Result<PersistedState, CoreError> {
        let file = match std::fs::read_to_string(&self.path) {
            Ok(raw) => toml::from_str::<StateFile>(&raw).map_err(|e| CoreError::Persistence {
                message: format!("failed to parse {}: {e}", self.path.display()),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StateFile::default(),
            Err(e) => {
                return Err(CoreError::Persistence {
                    message: format!("failed to read {}: {e}", self.path.display()),
                });
            }
        };

        let (access_token, refresh_token) = match self.tokens {
            TokenStorage::StateFile => (
                file.access_token.map(SecretString::from),
                file.refresh_token.map(SecretString::from),
            ),
            // Local sessions never hold OAuth tokens.
            TokenStorage::Keyring if file.login_mode == LoginMode::Local => (None, None),
            TokenStorage::Keyring => (
                self.keyring_get("access-token"),
                self.keyring_get("refresh-token"),
            ),
        };

        Ok(PersistedState {
            login_mode: file.login_mode,
            gateway_host: file.gateway_host,
            wall_connector_host: file.wall_connector_host,
            username: file.username,
            fleet_base_url: file.fleet_base_url,
            access_token,
            refresh_token,
            token_expires_at: file.token_expires_at,
            token_audience: file.token_audience,
            selected_site_index: file.selected_site_index,
            display: file.display,
        })
    }

    fn write(&self, state: &PersistedState) -> Result<(), CoreError> {
        let plaintext = |secret: &Option<SecretString>| {
            secret.as_ref().map(|s| s.expose_secret().to_owned())
        };

        let mut file = StateFile {
            login_mode: state.login_mode,
            gateway_host: state.gateway_host.clone(),
            wall_connector_host: state.wall_connector_host.clone(),
            username: state.username.clone(),
            fleet_base_url: state.fleet_base_url.clone(),
            token_expires_at: state.token_expires_at,
            token_audience: state.token_audience.clone(),
            selected_site_index: state.selected_site_index,
            access_token: None,
            refresh_token: None,
            display: state.display.clone(),
        };

        match self.tokens {
            TokenStorage::StateFile => {
                file.access_token = plaintext(&state.access_token);
                file.refresh_token = plaintext(&state.refresh_token);
            }
            TokenStorage::Keyring => {
                self.keyring_set("access-token", state.access_token.as_ref())?;
                self.keyring_set("refresh-token", state.refresh_token.as_ref())?;
            }
        }

        let raw = toml::to_string_pretty(&file).map_err(|e| CoreError::Persistence {
            message: format!("failed to serialize state: {e}"),
        })?;
        write_replacing(&self.path, &raw).map_err(|e| CoreError::Persistence {
            message: format!("failed to write {}: {e}", self.path.display()),
        })
    }

    fn keyring_entry(&self, kind: &str) -> Result<keyring::Entry, keyring::Error> {
        keyring::Entry::new(KEYRING_SERVICE, &format!("{}/{kind}", self.profile))
    }

    fn keyring_get(&self, kind: &str) -> Option<SecretString> {
        match self.keyring_entry(kind).and_then(|e| e.get_password()) {
            Ok(secret) => Some(SecretString::from(secret)),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                tracing::warn!(profile = %self.profile, kind, error = %e, "keyring read failed");
                None
            }
        }
    }

    fn keyring_set(&self, kind: &str, value: Option<&SecretString>) -> Result<(), CoreError> {
        match value {
            Some(secret) => self
                .keyring_entry(kind)
                .and_then(|entry| entry.set_password(secret.expose_secret()))
                .map_err(keyring_error),
            None => {
                match self.keyring_entry(kind).and_then(|e| e.delete_credential()) {
                    Ok(()) | Err(keyring::Error::NoEntry) => {}
                    Err(e) => {
                        tracing::debug!(profile = %self.profile, kind, error = %e, "keyring delete skipped");
                    }
                }
                Ok(())
            }
        }
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Result<PersistedState, CoreError> {
        let _guard = self.guard()?;
        self.read()
    }

    fn save(&self, state: &PersistedState) -> Result<(), CoreError> {
        let _guard = self.guard()?;
        self.write(state)
    }

    fn update(&self, apply: &mut dyn FnMut(&mut PersistedState)) -> Result<(), CoreError> {
        let _guard = self.guard()?;
        let mut state = self.read()?;
        apply(&mut state);
        self.write(&state)
    }
}

fn keyring_error(err: keyring::Error) -> CoreError {
    CoreError::Persistence {
        message: format!("keyring: {err}"),
    }
}

/// Write through a sibling temp file so a crash never leaves half a file.
fn write_replacing(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)
}
