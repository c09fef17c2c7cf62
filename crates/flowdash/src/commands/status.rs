//! Status command: one snapshot of every energy flow.

use std::fmt::Write;
use std::sync::Arc;

use chrono_tz::Tz;
use serde::Serialize;
use tabled::Tabled;

use flowdash_core::{
    ChargingState, EnergySnapshot, EnergySourceClient, FlowDirection, GridCarbon, LoginMode,
};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output::{self, Tint, format_energy, format_power, paint};

// ── View ────────────────────────────────────────────────────────────

/// Everything `status` and `watch` print for one snapshot.
#[derive(Debug, Serialize)]
pub struct StatusView {
    pub mode: LoginMode,
    pub site: Option<String>,
    pub off_grid: bool,
    pub snapshot: Arc<EnergySnapshot>,
    pub solar_energy_today_wh: Option<f64>,
    pub carbon: Option<Arc<GridCarbon>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl StatusView {
    pub fn new(client: &EnergySourceClient, snapshot: Arc<EnergySnapshot>) -> Self {
        let store = client.store();
        let site = store
            .site_info()
            .and_then(|info| info.name.clone())
            .or_else(|| store.selected_site().map(|s| s.name));
        Self {
            mode: client.mode(),
            site,
            off_grid: snapshot.is_off_grid(),
            snapshot,
            solar_energy_today_wh: store.solar_energy_today(),
            carbon: store.carbon(),
            warning: store.aux_error().map(|e| e.to_string()),
        }
    }
}

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct FlowRow {
    #[tabled(rename = "Flow")]
    flow: String,
    #[tabled(rename = "Power")]
    power: String,
    #[tabled(rename = "State")]
    state: String,
}

fn battery_state(snap: &EnergySnapshot) -> String {
    let direction = match snap.battery_flow() {
        FlowDirection::Forward => "discharging",
        FlowDirection::Reverse => "charging",
        FlowDirection::Idle => "idle",
    };
    match snap.battery_percentage {
        Some(pct) => format!("{direction} ({pct:.0}%)"),
        None => direction.to_owned(),
    }
}

fn grid_state(snap: &EnergySnapshot) -> &'static str {
    if snap.is_off_grid() {
        return "off-grid";
    }
    match snap.grid_flow() {
        FlowDirection::Forward => "importing",
        FlowDirection::Reverse => "exporting",
        FlowDirection::Idle => "idle",
    }
}

fn charger_state(state: ChargingState) -> &'static str {
    match state {
        ChargingState::Idle => "idle",
        ChargingState::PluggedIn => "plugged in",
        ChargingState::Charging => "charging",
    }
}

fn flow_rows(snap: &EnergySnapshot) -> Vec<FlowRow> {
    let mut rows = vec![
        FlowRow {
            flow: "Solar".into(),
            power: format_power(snap.solar_power),
            state: match snap.solar_flow() {
                FlowDirection::Forward => "producing".into(),
                _ => "idle".into(),
            },
        },
        FlowRow {
            flow: format!("Battery{}", snap.battery_count_label()),
            power: format_power(snap.battery_power),
            state: battery_state(snap),
        },
        FlowRow {
            flow: "Grid".into(),
            power: format_power(snap.site_power),
            state: grid_state(snap).into(),
        },
        FlowRow {
            flow: "Home".into(),
            power: format_power(snap.load_power),
            state: "consuming".into(),
        },
    ];
    rows.extend(snap.wall_connectors.iter().map(|wc| FlowRow {
        flow: format!("Charger {}", wc.id),
        power: format_power(wc.power_watts),
        state: charger_state(wc.state).into(),
    }));
    rows
}

// ── Renderers ───────────────────────────────────────────────────────

/// Multi-line detail view: heading, flow table, daily and grid summary.
pub fn detail(view: &StatusView, tz: Tz, color: bool) -> String {
    let snap = &view.snapshot;
    let mut out = String::new();

    let heading = view.site.as_deref().unwrap_or("Energy site");
    let _ = writeln!(
        out,
        "{} {}",
        paint(heading, Tint::Home, color),
        paint(&format!("({} mode)", view.mode), Tint::Muted, color)
    );
    if view.off_grid {
        let _ = writeln!(out, "{}", paint("Off grid", Tint::Warn, color));
    }
    let _ = writeln!(out, "{}", output::render_table(&flow_rows(snap)));

    if let Some(wh) = view.solar_energy_today_wh {
        let _ = writeln!(
            out,
            "{} {}",
            paint("Solar today:", Tint::Solar, color),
            format_energy(wh)
        );
    }
    if let Some(ref carbon) = view.carbon {
        let mut line = format!("Grid carbon ({}):", carbon.zone);
        if let Some(intensity) = carbon.carbon_intensity {
            let _ = write!(line, " {intensity:.0} gCO2eq/kWh");
        }
        if let Some(fossil) = carbon.fossil_fuel_percentage {
            let _ = write!(line, " \u{b7} {fossil:.0}% fossil");
        }
        let _ = writeln!(out, "{}", paint(&line, Tint::Grid, color));
    }
    if let Some(ref warning) = view.warning {
        let _ = writeln!(out, "{}", paint(warning, Tint::Warn, color));
    }
    let _ = write!(
        out,
        "{}",
        paint(
            &format!("Updated {}", snap.taken_at.with_timezone(&tz).format("%H:%M:%S %Z")),
            Tint::Muted,
            color
        )
    );
    out
}

/// Single line for `watch`.
pub fn summary_line(view: &StatusView, tz: Tz) -> String {
    let snap = &view.snapshot;
    let mut line = format!(
        "{}  solar {}  battery {} {}  grid {} {}  home {}",
        snap.taken_at.with_timezone(&tz).format("%H:%M:%S"),
        format_power(snap.solar_power),
        format_power(snap.battery_power),
        battery_state(snap),
        format_power(snap.site_power),
        grid_state(snap),
        format_power(snap.load_power),
    );
    for wc in &snap.wall_connectors {
        let _ = write!(
            line,
            "  charger {} {}",
            format_power(wc.power_watts),
            charger_state(wc.state)
        );
    }
    line
}

/// `key=value` lines for scripting.
pub fn plain(view: &StatusView) -> String {
    let snap = &view.snapshot;
    let mut out = String::new();
    let _ = writeln!(out, "solar_w={:.0}", snap.solar_power);
    let _ = writeln!(out, "battery_w={:.0}", snap.battery_power);
    if let Some(pct) = snap.battery_percentage {
        let _ = writeln!(out, "battery_pct={pct:.1}");
    }
    let _ = writeln!(out, "grid_w={:.0}", snap.site_power);
    let _ = writeln!(out, "load_w={:.0}", snap.load_power);
    let _ = writeln!(out, "off_grid={}", view.off_grid);
    if let Some(wh) = view.solar_energy_today_wh {
        let _ = writeln!(out, "solar_today_wh={wh:.0}");
    }
    for wc in &snap.wall_connectors {
        let _ = writeln!(out, "charger_{}_w={:.0}", wc.id, wc.power_watts);
    }
    out.trim_end().to_owned()
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(client: &EnergySourceClient, global: &GlobalOpts) -> Result<(), CliError> {
    super::connect(client, global).await?;

    let snapshot = client.store().snapshot().ok_or(CliError::NoData)?;
    let view = StatusView::new(client, snapshot);
    let tz = client.config().time_zone;
    let color = output::should_color(&global.color);

    let out = output::render_single(&global.output, &view, |v| detail(v, tz, color), plain)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use flowdash_core::{GridStatus, WallConnectorReading};

    use super::*;

    fn view(grid: GridStatus) -> StatusView {
        StatusView {
            mode: LoginMode::Local,
            site: Some("Home".into()),
            off_grid: grid.is_off_grid(),
            snapshot: Arc::new(EnergySnapshot {
                battery_power: -800.0,
                battery_count: Some(2),
                battery_percentage: Some(64.0),
                load_power: 1500.0,
                solar_power: 2180.0,
                solar_energy_exported: None,
                site_power: 120.0,
                grid_status: Some(grid),
                wall_connectors: vec![WallConnectorReading {
                    id: "wc1".into(),
                    state: ChargingState::PluggedIn,
                    power_watts: 0.0,
                }],
                taken_at: Utc.with_ymd_and_hms(2024, 5, 10, 2, 30, 0).unwrap(),
            }),
            solar_energy_today_wh: Some(18_432.0),
            carbon: None,
            warning: None,
        }
    }

    #[test]
    fn detail_shows_every_flow() {
        let text = detail(&view(GridStatus::Connected), Tz::UTC, false);
        assert!(text.contains("Battery \u{b7} 2x"));
        assert!(text.contains("charging (64%)"));
        assert!(text.contains("importing"));
        assert!(text.contains("Charger wc1"));
        assert!(text.contains("plugged in"));
        assert!(text.contains("Solar today: 18.4 kWh"));
        assert!(text.contains("Updated 02:30:00 UTC"));
        assert!(!text.contains("Off grid"));
    }

    #[test]
    fn islanded_site_is_flagged() {
        let text = detail(&view(GridStatus::Islanded), Tz::UTC, false);
        assert!(text.contains("Off grid"));
        assert!(text.contains("off-grid"));
    }

    #[test]
    fn plain_output_is_key_value() {
        let text = plain(&view(GridStatus::Connected));
        assert!(text.contains("solar_w=2180"));
        assert!(text.contains("battery_pct=64.0"));
        assert!(text.contains("off_grid=false"));
        assert!(text.contains("charger_wc1_w=0"));
    }

    #[test]
    fn summary_fits_one_line() {
        let line = summary_line(&view(GridStatus::Connected), Tz::UTC);
        assert!(line.starts_with("02:30:00"));
        assert!(!line.contains('\n'));
    }
}
