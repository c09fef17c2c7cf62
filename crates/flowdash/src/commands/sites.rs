//! Site command handlers.

use serde::Serialize;
use tabled::Tabled;

use flowdash_core::{EnergySite, EnergySourceClient, LoginMode};

use crate::cli::{GlobalOpts, SitesArgs, SitesCommand};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SiteEntry {
    index: usize,
    #[serde(flatten)]
    site: EnergySite,
    selected: bool,
}

#[derive(Tabled)]
struct SiteRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Selected")]
    selected: &'static str,
}

impl From<&SiteEntry> for SiteRow {
    fn from(e: &SiteEntry) -> Self {
        Self {
            index: e.index,
            id: e.site.id,
            name: e.site.name.clone(),
            selected: if e.selected { "*" } else { "" },
        }
    }
}

fn entries(client: &EnergySourceClient) -> Vec<SiteEntry> {
    let store = client.store();
    let selected = store.selected_site_index();
    store
        .sites()
        .iter()
        .enumerate()
        .map(|(index, site)| SiteEntry {
            index,
            site: site.clone(),
            selected: index == selected,
        })
        .collect()
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    client: &EnergySourceClient,
    args: SitesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if client.mode() != LoginMode::Cloud {
        return Err(CliError::Unsupported {
            message: "energy sites are only listed in cloud mode".into(),
        });
    }
    super::connect(client, global).await?;

    match args.command {
        SitesCommand::List => {
            let sites = entries(client);
            let out = output::render_list(&global.output, &sites, |e| SiteRow::from(e), |e| {
                format!("{} {} {}", e.index, e.site.id, e.site.name)
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SitesCommand::Select { index } => {
            let count = client.store().sites().len();
            if index >= count {
                return Err(CliError::Validation {
                    field: "index".into(),
                    reason: format!("account has {count} site(s); choose 0..{count}"),
                });
            }
            let selected = client.select_site(index).await?;
            let name = client
                .store()
                .selected_site()
                .map(|s| s.name)
                .unwrap_or_default();
            if !global.quiet {
                eprintln!("✓ Selected site {selected}: {name}");
            }
            Ok(())
        }
    }
}
