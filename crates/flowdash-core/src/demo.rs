// ── Demo source ──
//
// Fixed synthetic data shown when the gateway host is `demo`. Nothing
// here touches the network.

use chrono::{DateTime, Duration, Timelike, Utc};

use crate::model::{
    ChargingState, EnergySnapshot, FlowEndpoint, GridStatus, HistoricalSeries, HistoryPoint,
    SiteInfo, WallConnectorReading, insert_zero_crossings,
};
use crate::window::HistoryWindow;

const SAMPLE_STEP_MINUTES: i64 = 15;

pub(crate) const SOLAR_ENERGY_TODAY_WH: f64 = 18_432.0;

pub(crate) fn snapshot(taken_at: DateTime<Utc>) -> EnergySnapshot {
    EnergySnapshot {
        battery_power: 256.0,
        battery_count: Some(1),
        battery_percentage: Some(100.0),
        load_power: 2304.0,
        solar_power: 2048.0,
        solar_energy_exported: Some(4_096_000.0),
        site_power: 1024.0,
        grid_status: Some(GridStatus::Connected),
        wall_connectors: vec![WallConnectorReading {
            id: "def456".into(),
            state: ChargingState::Charging,
            power_watts: 512.0,
        }],
        taken_at,
    }
}

pub(crate) fn site_info() -> SiteInfo {
    SiteInfo {
        name: Some("Home sweet home".into()),
        battery_count: Some(1),
        firmware_version: Some("demo".into()),
        installation_date: None,
        nameplate_power: Some(5000.0),
        time_zone: None,
    }
}

/// Synthetic power and state-of-charge series for `window`: the battery
/// charges from solar around midday and discharges to the home at night.
pub(crate) fn history(window: &HistoryWindow) -> (HistoricalSeries, HistoricalSeries) {
    let start = window.start.with_timezone(&Utc);
    let end = window.end.with_timezone(&Utc);

    let mut power = Vec::new();
    let mut soe = Vec::new();
    let mut at = start;
    while at <= end {
        let hour = f64::from(window_hour(window, at));
        let phase = (hour - 6.0) / 12.0 * std::f64::consts::PI;
        let charging = phase.sin();

        let mut point = HistoryPoint::new(at, -2000.0 * charging);
        if charging > 0.0 {
            point.from = Some(FlowEndpoint::Solar);
            point.to = Some(FlowEndpoint::Battery);
        } else {
            point.from = Some(FlowEndpoint::Battery);
            point.to = Some(FlowEndpoint::Home);
        }
        power.push(point);
        soe.push(HistoryPoint::new(at, 55.0 - 40.0 * phase.cos()));

        at += Duration::minutes(SAMPLE_STEP_MINUTES);
    }

    (
        HistoricalSeries {
            points: insert_zero_crossings(&power),
        },
        HistoricalSeries::new(soe),
    )
}

fn window_hour(window: &HistoryWindow, at: DateTime<Utc>) -> u32 {
    at.with_timezone(&window.end.timezone()).hour()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use chrono_tz::Tz;

    use super::*;

    #[test]
    fn demo_snapshot_is_on_grid_with_one_charger() {
        let snap = snapshot(Utc::now());
        assert!(!snap.is_off_grid());
        assert_eq!(snap.battery_count_label(), " \u{b7} 1x");
        assert_eq!(snap.wall_connectors.len(), 1);
        assert_eq!(snap.wall_connectors[0].state, ChargingState::Charging);
    }

    #[test]
    fn demo_history_covers_the_window() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let window = HistoryWindow::ending_at(now, now, Tz::UTC);
        let (power, soe) = history(&window);

        assert_eq!(soe.len(), 97);
        assert!(power.len() >= soe.len());
        assert_eq!(soe.points[0].timestamp, window.start.with_timezone(&Utc));
        assert!(power.points.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }
}
