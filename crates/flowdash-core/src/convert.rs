// ── API-to-domain type conversions ──
//
// Maps raw `flowdash_api` response types into canonical `crate::model`
// types. Gateway and fleet payloads describe the same physical readings
// with different shapes; everything downstream sees one model.

use chrono::{DateTime, Utc};
use flowdash_api::carbon::{CarbonIntensity, PowerBreakdown};
use flowdash_api::fleet::models::{
    EnergyHistoryEntry, LiveStatus, LiveWallConnector, Product, SiteInfo as FleetSiteInfo,
    SoeHistoryEntry,
};
use flowdash_api::gateway::models::{GridStatusResponse, MeterAggregates};
use flowdash_api::Vitals;

use crate::model::{
    ChargingState, EnergySite, EnergySnapshot, FlowEndpoint, GridCarbon, GridStatus,
    HistoricalSeries, HistoryPoint, SiteInfo, WallConnectorReading, insert_zero_crossings,
};
use crate::store::MeterReadings;

// ── Local gateway ────────────────────────────────────────────────────

pub(crate) fn meter_readings(raw: &MeterAggregates) -> MeterReadings {
    MeterReadings {
        battery_power: raw.battery.instant_power,
        battery_count: raw.battery.num_meters_aggregated,
        load_power: raw.load.instant_power,
        solar_power: raw.solar.instant_power,
        solar_energy_exported: raw.solar.energy_exported,
        site_power: raw.site.instant_power,
    }
}

pub(crate) fn grid_status(raw: &GridStatusResponse) -> GridStatus {
    GridStatus::from_raw(&raw.grid_status)
}

// ── Wall connector ───────────────────────────────────────────────────

/// Local vitals: a closed contactor means current is flowing.
pub(crate) fn vitals_state(vitals: &Vitals) -> ChargingState {
    if vitals.contactor_closed {
        ChargingState::Charging
    } else if vitals.vehicle_connected {
        ChargingState::PluggedIn
    } else {
        ChargingState::Idle
    }
}

pub(crate) fn local_wall_connector(id: &str, vitals: &Vitals) -> WallConnectorReading {
    WallConnectorReading {
        id: id.to_owned(),
        state: vitals_state(vitals),
        power_watts: vitals.power_watts(),
    }
}

/// Fleet `wall_connector_state` codes: 1 charging, 4 plugged in.
pub(crate) fn fleet_charging_state(code: u32) -> ChargingState {
    match code {
        1 => ChargingState::Charging,
        4 => ChargingState::PluggedIn,
        _ => ChargingState::Idle,
    }
}

fn fleet_wall_connector(raw: &LiveWallConnector) -> WallConnectorReading {
    WallConnectorReading {
        id: raw.din.clone(),
        state: fleet_charging_state(raw.wall_connector_state),
        power_watts: raw.wall_connector_power,
    }
}

// ── Fleet API ────────────────────────────────────────────────────────

fn live_grid_status(raw: &LiveStatus) -> Option<GridStatus> {
    if raw
        .island_status
        .as_deref()
        .is_some_and(|s| s.starts_with("off_grid"))
    {
        return Some(GridStatus::Islanded);
    }
    raw.grid_status.as_deref().map(GridStatus::from_raw)
}

/// One live status payload as a complete snapshot.
pub(crate) fn live_snapshot(raw: &LiveStatus, battery_count: Option<u32>) -> EnergySnapshot {
    EnergySnapshot {
        battery_power: raw.battery_power,
        battery_count,
        battery_percentage: raw.percentage_charged,
        load_power: raw.load_power,
        solar_power: raw.solar_power,
        solar_energy_exported: None,
        site_power: raw.grid_power,
        grid_status: live_grid_status(raw),
        wall_connectors: raw.wall_connectors.iter().map(fleet_wall_connector).collect(),
        taken_at: raw
            .timestamp
            .map_or_else(Utc::now, |t| t.with_timezone(&Utc)),
    }
}

/// Energy sites among the account's products, in listing order.
pub(crate) fn energy_sites(products: &[Product]) -> Vec<EnergySite> {
    products
        .iter()
        .filter_map(|p| {
            let id = p.energy_site_id?;
            let name = p
                .site_name
                .clone()
                .or_else(|| p.display_name.clone())
                .unwrap_or_else(|| format!("Site {id}"));
            Some(EnergySite { id, name })
        })
        .collect()
}

pub(crate) fn site_info(raw: FleetSiteInfo) -> SiteInfo {
    SiteInfo {
        name: raw.site_name,
        battery_count: raw.battery_count,
        firmware_version: raw.version,
        installation_date: raw.installation_date,
        nameplate_power: raw.nameplate_power,
        time_zone: raw.installation_time_zone,
    }
}

// ── History ──────────────────────────────────────────────────────────

/// Battery energy per interval: positive discharging into the home,
/// negative charging, tagged with source and destination.
fn battery_flow_point(entry: &EnergyHistoryEntry) -> HistoryPoint {
    let from_solar = entry.battery_energy_imported_from_solar;
    let from_grid = entry.battery_energy_imported_from_grid;
    let charged = from_solar + from_grid;
    let discharged = entry.battery_energy_exported;
    let value = discharged - charged;

    let (from, to) = if value < 0.0 {
        (FlowEndpoint::charge_source(from_solar, from_grid), FlowEndpoint::Battery)
    } else {
        (FlowEndpoint::Battery, FlowEndpoint::Home)
    };

    HistoryPoint {
        timestamp: entry.timestamp.with_timezone(&Utc),
        value,
        from: Some(from),
        to: Some(to),
    }
}

/// Power-flow series with zero points inserted where the battery flips
/// between charging and discharging.
pub(crate) fn power_series(entries: &[EnergyHistoryEntry]) -> HistoricalSeries {
    let sorted = HistoricalSeries::new(entries.iter().map(battery_flow_point).collect());
    HistoricalSeries {
        points: insert_zero_crossings(&sorted.points),
    }
}

pub(crate) fn soe_series(entries: &[SoeHistoryEntry]) -> HistoricalSeries {
    HistoricalSeries::new(
        entries
            .iter()
            .map(|e| HistoryPoint::new(e.timestamp.with_timezone(&Utc), e.soe))
            .collect(),
    )
}

/// Total solar production (Wh) across the entries.
pub(crate) fn solar_energy_total(entries: &[EnergyHistoryEntry]) -> f64 {
    entries.iter().map(|e| e.solar_energy_exported).sum()
}

// ── Carbon ───────────────────────────────────────────────────────────

pub(crate) fn grid_carbon(
    zone: &str,
    intensity: Option<&CarbonIntensity>,
    breakdown: Option<&PowerBreakdown>,
    fetched_at: DateTime<Utc>,
) -> GridCarbon {
    GridCarbon {
        zone: zone.to_owned(),
        carbon_intensity: intensity.and_then(|i| i.carbon_intensity),
        fossil_fuel_percentage: breakdown
            .and_then(|b| b.fossil_free_percentage)
            .map(|free| 100.0 - free),
        fetched_at,
    }
}
