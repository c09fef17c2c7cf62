//! CLI configuration: wraps flowdash-config and adds flag overrides.

use std::sync::Arc;
use std::time::Duration;

use flowdash_core::{ClientConfig, TlsVerification};

pub use flowdash_config::{
    Config, FileSettingsStore, Profile, SecretKind, TokenStorage, config_path,
    load_config_or_default, save_config, state_path, store_secret, to_toml,
};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// A profile resolved against the config file and CLI flags.
#[derive(Debug)]
pub struct Resolved {
    pub profile_name: String,
    pub client: ClientConfig,
    pub tokens: TokenStorage,
}

impl Resolved {
    /// File-backed persistence for this profile's session state.
    pub fn settings(&self) -> Arc<FileSettingsStore> {
        Arc::new(FileSettingsStore::for_profile(
            &self.profile_name,
            self.tokens,
        ))
    }
}

/// Determine the active profile name from flags or config.
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build the client configuration for the active profile with CLI flag
/// overrides. Without a matching profile, `--host` alone is enough.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.host.is_some() => Profile::default(),
        None if global.profile.is_some() => {
            let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
            available.sort();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    apply_overrides(&mut profile, global);
    let mut client =
        flowdash_config::profile_to_client_config(&profile, &profile_name, &cfg.defaults)?;
    if global.insecure {
        client.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        client.timeout = Duration::from_secs(secs);
    }

    Ok(Resolved {
        profile_name,
        client,
        tokens: profile.token_storage(),
    })
}

fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref host) = global.host {
        profile.host = Some(host.clone());
    }
    if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }
    if let Some(ref tz) = global.tz {
        profile.time_zone = Some(tz.clone());
    }
}
