//! Config subcommand handlers.

use dialoguer::{Confirm, Input, Select};
use flowdash_core::{DEMO_HOST, LoginMode};
use secrecy::{ExposeSecret, SecretString};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, SecretArg};
use crate::config::{self, Config, Profile, SecretKind};
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy of `cfg` with every plaintext secret masked.
fn redacted(cfg: &Config) -> Config {
    let mask = |secret: &Option<String>| secret.as_ref().map(|_| MASK.to_owned());
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        profile.password = mask(&profile.password);
        profile.client_secret = mask(&profile.client_secret);
        profile.carbon_api_key = mask(&profile.carbon_api_key);
    }
    cfg
}

fn render_toml(cfg: &Config) -> String {
    config::to_toml(cfg).unwrap_or_else(|e| format!("# failed to render config: {e}"))
}

fn profile_list(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        return "(none)".into();
    }
    let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
    names.sort();
    names.join(", ")
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_text(prompt: &str, default: Option<&str>) -> Result<String, CliError> {
    let mut input = Input::<String>::new().with_prompt(prompt);
    if let Some(default) = default {
        input = input.default(default.to_owned());
    }
    input.interact_text().map_err(prompt_err)
}

fn prompt_optional(prompt: &str) -> Result<Option<String>, CliError> {
    let value: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;
    Ok(Some(value.trim().to_owned()).filter(|v| !v.is_empty()))
}

/// Ask for a secret and offer keyring storage.
///
/// Returns `Some(secret)` if the user chose plaintext, `None` if it went to
/// the keyring.
fn prompt_secret(
    profile_name: &str,
    kind: SecretKind,
    label: &str,
) -> Result<Option<String>, CliError> {
    let secret = rpassword::prompt_password(format!("{label}: ")).map_err(prompt_err)?;
    if secret.is_empty() {
        return Err(CliError::Validation {
            field: label.to_lowercase(),
            reason: "cannot be empty".into(),
        });
    }

    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt(format!("Where to store the {label}?"))
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        config::store_secret(profile_name, kind, &secret)?;
        eprintln!("   ✓ {label} stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(secret))
    }
}

fn init_local(profile_name: &str, profile: &mut Profile) -> Result<(), CliError> {
    profile.mode = LoginMode::Local;
    profile.host = Some(prompt_text("Gateway host", Some("192.168.1.50"))?);
    profile.username = Some(prompt_text("Account e-mail", None)?);
    profile.password = prompt_secret(profile_name, SecretKind::GatewayPassword, "Gateway password")?;
    profile.wall_connector_host = prompt_optional("Wall connector host (optional)")?;
    Ok(())
}

fn init_cloud(profile_name: &str, profile: &mut Profile) -> Result<(), CliError> {
    profile.mode = LoginMode::Cloud;
    profile.client_id = Some(prompt_text("OAuth client id", None)?);
    profile.client_secret = prompt_secret(profile_name, SecretKind::ClientSecret, "Client secret")?;
    profile.redirect_uri = Some(prompt_text("Redirect URI", None)?);
    Ok(())
}

fn init_carbon(profile_name: &str, profile: &mut Profile) -> Result<(), CliError> {
    let wanted = Confirm::new()
        .with_prompt("Show grid carbon intensity (Electricity Maps)?")
        .default(false)
        .interact()
        .map_err(prompt_err)?;
    if wanted {
        profile.carbon_zone = Some(prompt_text("Grid zone (e.g. AU-NSW)", None)?);
        profile.carbon_api_key =
            prompt_secret(profile_name, SecretKind::CarbonApiKey, "Electricity Maps API key")?;
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(),

        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(&global.output, &cfg, render_toml, |c| {
                c.default_profile.clone().unwrap_or_default()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            let cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            println!("config = {}", config::config_path().display());
            println!("state  = {}", config::state_path(&profile_name).display());
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: flowdash config init");
            } else {
                let mut names: Vec<_> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name} ({}){marker}", cfg.profiles[name].mode);
                }
            }
            Ok(())
        }

        ConfigCommand::SetSecret { kind } => {
            let cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(CliError::ProfileNotFound {
                    available: profile_list(&cfg),
                    name: profile_name,
                });
            }

            let (kind, label) = match kind {
                SecretArg::Password => (SecretKind::GatewayPassword, "Gateway password"),
                SecretArg::ClientSecret => (SecretKind::ClientSecret, "Client secret"),
                SecretArg::CarbonApiKey => (SecretKind::CarbonApiKey, "Electricity Maps API key"),
            };
            let secret = SecretString::from(
                rpassword::prompt_password(format!("{label}: ")).map_err(prompt_err)?,
            );
            if secret.expose_secret().is_empty() {
                return Err(CliError::Validation {
                    field: "secret".into(),
                    reason: "value cannot be empty".into(),
                });
            }
            config::store_secret(&profile_name, kind, secret.expose_secret())?;
            eprintln!("✓ {label} stored in system keyring for profile '{profile_name}'");
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: profile_list(&cfg),
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }
    }
}

fn init() -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("flowdash configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name = prompt_text("Profile name", Some("default"))?;

    let sources = &[
        "Gateway on the local network",
        "Cloud fleet API (OAuth)",
        "Demo data",
    ];
    let source = Select::new()
        .with_prompt("Data source")
        .items(sources)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let mut profile = Profile::default();
    match source {
        0 => init_local(&profile_name, &mut profile)?,
        1 => init_cloud(&profile_name, &mut profile)?,
        _ => profile.host = Some(DEMO_HOST.into()),
    }

    profile.time_zone = prompt_optional("Time zone (IANA, e.g. Australia/Sydney; blank for UTC)")?;
    if let Some(ref tz) = profile.time_zone {
        flowdash_config::parse_time_zone(tz)?;
    }
    if source != 2 {
        init_carbon(&profile_name, &mut profile)?;
    }

    let mut cfg = config::load_config_or_default();
    cfg.profiles.insert(profile_name.clone(), profile);
    cfg.default_profile = Some(profile_name.clone());
    config::save_config(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", config_path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Try it: flowdash login && flowdash status");
    Ok(())
}
