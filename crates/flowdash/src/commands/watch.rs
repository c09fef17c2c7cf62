//! Watch command: poll in the background and print every new snapshot.

use std::sync::Arc;

use chrono_tz::Tz;

use flowdash_core::{EnergySnapshot, EnergySourceClient};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output::{self, Tint, paint};

use super::status::{self, StatusView};

fn emit(
    client: &EnergySourceClient,
    snapshot: Arc<EnergySnapshot>,
    global: &GlobalOpts,
    tz: Tz,
) -> Result<(), CliError> {
    let view = StatusView::new(client, snapshot);
    // One record per line for the structured formats.
    let format = match global.output {
        OutputFormat::Json | OutputFormat::JsonCompact => &OutputFormat::JsonCompact,
        ref other => other,
    };
    let out = output::render_single(
        format,
        &view,
        |v| status::summary_line(v, tz),
        status::plain,
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn handle(
    client: &EnergySourceClient,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let tz = client.config().time_zone;

    // The first failure is not fatal here; polling keeps retrying.
    if let Err(e) = super::connect(client, global).await {
        tracing::warn!(error = %e, "initial fetch failed");
    }

    let mut snapshots = client.snapshot_stream();
    let mut errors = client.error();
    let mut shown = 0usize;
    let done = |shown: usize| args.count.is_some_and(|n| shown >= n);

    if let Some(snapshot) = snapshots.current().cloned() {
        emit(client, snapshot, global, tz)?;
        shown += 1;
    } else if let Some(err) = errors.borrow_and_update().clone() {
        eprintln!("{}", paint(&err.to_string(), Tint::Warn, color));
    }

    client.start().await;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while !done(shown) {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = snapshots.changed() => match changed {
                Some(Some(snapshot)) => {
                    emit(client, snapshot, global, tz)?;
                    shown += 1;
                }
                Some(None) => {}
                None => break,
            },
            Ok(()) = errors.changed() => {
                if let Some(err) = errors.borrow_and_update().clone() {
                    eprintln!("{}", paint(&err.to_string(), Tint::Warn, color));
                }
            }
        }
    }

    client.shutdown().await;
    Ok(())
}
