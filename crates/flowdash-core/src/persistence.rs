// ── Persistence port ──
//
// State that must outlive a process: the login mode, resolved base URL,
// tokens, selected site and display preferences. Core reads it once at
// construction and writes changes back through `SettingsStore`; the
// backing storage (files, keyring, memory) is the caller's concern.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::LoginMode;
use crate::error::CoreError;

/// Presentation toggles the dashboard remembers between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayPrefs {
    pub show_wall_connectors: bool,
    pub show_carbon: bool,
}

impl Default for DisplayPrefs {
    fn default() -> Self {
        Self {
            show_wall_connectors: true,
            show_carbon: true,
        }
    }
}

/// Everything the client persists.
#[derive(Debug, Clone, Default)]
pub struct PersistedState {
    pub login_mode: LoginMode,
    pub gateway_host: Option<String>,
    pub wall_connector_host: Option<String>,
    pub username: Option<String>,
    /// Fleet host found by region discovery.
    pub fleet_base_url: Option<Url>,
    pub access_token: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Base URL the access token was issued for.
    pub token_audience: Option<Url>,
    pub selected_site_index: usize,
    pub display: DisplayPrefs,
}

impl PersistedState {
    pub fn clear_tokens(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.token_expires_at = None;
        self.token_audience = None;
    }
}

/// Storage backend for [`PersistedState`].
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<PersistedState, CoreError>;

    fn save(&self, state: &PersistedState) -> Result<(), CoreError>;

    /// Load, modify and save in one step. Implementations shared between
    /// tasks override this to hold their lock across all three.
    fn update(&self, apply: &mut dyn FnMut(&mut PersistedState)) -> Result<(), CoreError> {
        let mut state = self.load()?;
        apply(&mut state);
        self.save(&state)
    }
}

/// In-memory store for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemorySettings {
    state: Mutex<PersistedState>,
}

impl MemorySettings {
    pub fn new(state: PersistedState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, PersistedState>, CoreError> {
        self.state.lock().map_err(|_| CoreError::Persistence {
            message: "settings lock poisoned".into(),
        })
    }
}

impl SettingsStore for MemorySettings {
    fn load(&self) -> Result<PersistedState, CoreError> {
        self.lock().map(|s| s.clone())
    }

    fn save(&self, state: &PersistedState) -> Result<(), CoreError> {
        *self.lock()? = state.clone();
        Ok(())
    }

    fn update(&self, apply: &mut dyn FnMut(&mut PersistedState)) -> Result<(), CoreError> {
        apply(&mut *self.lock()?);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn update_round_trips_through_memory() {
        let store = MemorySettings::default();
        store
            .update(&mut |s: &mut PersistedState| {
                s.selected_site_index = 2;
                s.access_token = Some(SecretString::from("tok".to_string()));
            })
            .unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.selected_site_index, 2);
        assert_eq!(
            loaded.access_token.as_ref().map(|t| t.expose_secret().to_owned()),
            Some("tok".to_owned())
        );
        assert!(loaded.display.show_carbon);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let store = std::sync::Arc::new(MemorySettings::default());
        let writers: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store
                            .update(&mut |s: &mut PersistedState| s.selected_site_index += 1)
                            .unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(store.load().unwrap().selected_site_index, 800);
    }

    #[test]
    fn clear_tokens_keeps_other_state() {
        let mut state = PersistedState {
            access_token: Some(SecretString::from("a".to_string())),
            refresh_token: Some(SecretString::from("r".to_string())),
            selected_site_index: 1,
            ..PersistedState::default()
        };
        state.clear_tokens();
        assert!(state.access_token.is_none());
        assert!(state.refresh_token.is_none());
        assert_eq!(state.selected_site_index, 1);
    }
}
