//! Command dispatch: bridges CLI args -> `EnergySourceClient` -> output.

pub mod config_cmd;
pub mod history;
pub mod session;
pub mod sites;
pub mod status;
pub mod watch;

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use flowdash_core::{Authorizer, EnergySourceClient};

use crate::authorizer::TerminalAuthorizer;
use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Dispatch a client-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let resolved = config::resolve(global)?;
    let settings = resolved.settings();

    // Only `login` may open the interactive authorization flow.
    let authorizer = matches!(cmd, Command::Login)
        .then(|| -> Arc<dyn Authorizer> { Arc::new(TerminalAuthorizer) });

    let client = EnergySourceClient::new(resolved.client, settings, authorizer)?;
    tracing::debug!(profile = %resolved.profile_name, mode = %client.mode(), "client ready");

    match cmd {
        Command::Status => status::handle(&client, global).await,
        Command::Watch(args) => watch::handle(&client, args, global).await,
        Command::History(args) => history::handle(&client, args, global).await,
        Command::Sites(args) => sites::handle(&client, args, global).await,
        Command::Login => session::login(&client, &resolved.profile_name, global).await,
        Command::Logout => session::logout(&client, &resolved.profile_name, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}

/// Run the initial fetch, with a spinner on interactive terminals.
pub async fn connect(client: &EnergySourceClient, global: &GlobalOpts) -> Result<(), CliError> {
    let spinner = (!global.quiet && std::io::stderr().is_terminal()).then(|| {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(if client.is_demo() {
            "Loading demo data..."
        } else {
            "Connecting..."
        });
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    });

    let result = client.connect().await;
    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }
    result.map_err(CliError::from)
}
