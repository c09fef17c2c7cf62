//! Login and logout.

use flowdash_core::{EnergySourceClient, LoginMode};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub async fn login(
    client: &EnergySourceClient,
    profile_name: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if client.is_demo() {
        eprintln!("Demo data needs no login.");
        return Ok(());
    }

    super::connect(client, global).await?;
    tracing::info!(profile = profile_name, "signed in");
    if !global.quiet {
        let target = match client.mode() {
            LoginMode::Local => "gateway",
            LoginMode::Cloud => "fleet API",
        };
        eprintln!("✓ Signed in to the {target} for profile '{profile_name}'");
    }
    Ok(())
}

pub async fn logout(
    client: &EnergySourceClient,
    profile_name: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    client.logout().await;
    if !global.quiet {
        eprintln!("✓ Signed out of profile '{profile_name}'");
    }
    Ok(())
}
