//! History command: a 24 hour window of battery power or state of energy.

use std::fmt::Write;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tabled::Tabled;

use flowdash_core::{
    EnergySourceClient, FlowEndpoint, HistoricalSeries, HistoryPoint, LoginMode,
};

use crate::cli::{GlobalOpts, HistoryArgs, HistorySeries};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct HistoryView {
    label: String,
    series: &'static str,
    points: Arc<HistoricalSeries>,
}

#[derive(Tabled)]
struct PointRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "To")]
    to: String,
}

fn point_row(point: &HistoryPoint, series: HistorySeries, tz: Tz) -> PointRow {
    let endpoint = |e: Option<FlowEndpoint>| e.map(|e| e.to_string()).unwrap_or_default();
    PointRow {
        time: point.timestamp.with_timezone(&tz).format("%H:%M").to_string(),
        value: match series {
            HistorySeries::Power => format!("{:.0} W", point.value),
            HistorySeries::Soe => format!("{:.1}%", point.value),
        },
        from: endpoint(point.from),
        to: endpoint(point.to),
    }
}

/// Last second of `date` in `tz`.
fn end_of_day(date: NaiveDate, tz: Tz) -> Result<DateTime<Utc>, CliError> {
    date.and_hms_opt(23, 59, 59)
        .and_then(|naive| tz.from_local_datetime(&naive).latest())
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| CliError::Validation {
            field: "date".into(),
            reason: format!("{date} has no end of day in {tz}"),
        })
}

fn window_end(args: &HistoryArgs, tz: Tz, now: DateTime<Utc>) -> Result<DateTime<Utc>, CliError> {
    match (args.date, args.days_ago) {
        (Some(date), _) => end_of_day(date, tz),
        (None, Some(days)) => Ok(now - Duration::days(i64::from(days))),
        (None, None) => Ok(now),
    }
}

pub async fn handle(
    client: &EnergySourceClient,
    args: HistoryArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let tz = client.config().time_zone;
    let end = window_end(&args, tz, Utc::now())?;
    if client.mode() == LoginMode::Cloud {
        // Sites must be known before a site's history can be queried.
        super::connect(client, global).await?;
    }
    client.fetch_history(end).await?;

    let (name, points) = match args.series {
        HistorySeries::Power => ("power", client.store().power_history()),
        HistorySeries::Soe => ("soe", client.store().soe_history()),
    };
    let view = HistoryView {
        label: client.history_label().unwrap_or_default(),
        series: name,
        points,
    };

    let series = args.series;
    let out = output::render_single(
        &global.output,
        &view,
        |v| {
            let rows: Vec<PointRow> = v
                .points
                .points
                .iter()
                .map(|p| point_row(p, series, tz))
                .collect();
            format!(
                "{} \u{b7} battery {}\n{}",
                v.label,
                v.series,
                output::render_table(&rows)
            )
        },
        |v| {
            let mut out = String::new();
            for p in &v.points.points {
                let _ = writeln!(out, "{} {}", p.timestamp.to_rfc3339(), p.value);
            }
            out.trim_end().to_owned()
        },
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
