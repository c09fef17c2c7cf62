// Fleet API response types
//
// Field names follow the fleet API's snake_case JSON. Numeric readings
// default to zero when omitted, which the API does for idle meters.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

/// The `{ "response": ... }` envelope around every fleet payload.
#[derive(Debug, Deserialize)]
pub struct FleetResponse<T> {
    pub response: T,
}

/// Response of `/api/1/users/region`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegionInfo {
    pub region: Option<String>,
    /// Authoritative base URL for this account.
    pub fleet_api_base_url: Option<String>,
}

/// One entry of `/api/1/products`. Vehicles and energy sites share the
/// list; only entries with `energy_site_id` are energy sites.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub energy_site_id: Option<u64>,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Wall connector entry embedded in the live status payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LiveWallConnector {
    pub din: String,
    #[serde(default)]
    pub vin: Option<String>,
    #[serde(default)]
    pub wall_connector_state: u32,
    #[serde(default)]
    pub wall_connector_power: f64,
}

/// Response of `/api/1/energy_sites/{id}/live_status`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LiveStatus {
    #[serde(default)]
    pub solar_power: f64,
    #[serde(default)]
    pub battery_power: f64,
    #[serde(default)]
    pub load_power: f64,
    #[serde(default)]
    pub grid_power: f64,
    #[serde(default)]
    pub percentage_charged: Option<f64>,
    /// `Active` or `Inactive`.
    #[serde(default)]
    pub grid_status: Option<String>,
    #[serde(default)]
    pub island_status: Option<String>,
    #[serde(default)]
    pub wall_connectors: Vec<LiveWallConnector>,
    #[serde(default)]
    pub timestamp: Option<DateTime<FixedOffset>>,
}

/// Response of `/api/1/energy_sites/{id}/site_info`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SiteInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub battery_count: Option<u32>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub installation_date: Option<String>,
    #[serde(default)]
    pub nameplate_power: Option<f64>,
    #[serde(default)]
    pub installation_time_zone: Option<String>,
}

/// Envelope of `/api/1/energy_sites/{id}/calendar_history`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CalendarHistory<T> {
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default = "Vec::new")]
    pub time_series: Vec<T>,
}

/// One interval of `kind=energy` history. All values are Wh for the interval.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnergyHistoryEntry {
    pub timestamp: DateTime<FixedOffset>,
    #[serde(default)]
    pub solar_energy_exported: f64,
    #[serde(default)]
    pub grid_energy_imported: f64,
    #[serde(default)]
    pub grid_energy_exported_from_solar: f64,
    #[serde(default)]
    pub grid_energy_exported_from_battery: f64,
    #[serde(default)]
    pub battery_energy_exported: f64,
    #[serde(default)]
    pub battery_energy_imported_from_grid: f64,
    #[serde(default)]
    pub battery_energy_imported_from_solar: f64,
    #[serde(default)]
    pub consumer_energy_imported_from_grid: f64,
    #[serde(default)]
    pub consumer_energy_imported_from_solar: f64,
    #[serde(default)]
    pub consumer_energy_imported_from_battery: f64,
}

/// One interval of `kind=soe` history.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SoeHistoryEntry {
    pub timestamp: DateTime<FixedOffset>,
    /// State of energy in percent.
    #[serde(default)]
    pub soe: f64,
}
