// Local gateway response types
//
// Field names follow the gateway's snake_case JSON. Only the fields the
// dashboard consumes are modelled; everything else is ignored.

use serde::Deserialize;

/// A single meter entry from `/api/meters/aggregates`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MeterReading {
    /// Instantaneous power in watts. Positive means drawing from this
    /// meter's source (battery discharging, grid importing).
    #[serde(default)]
    pub instant_power: f64,
    /// Cumulative energy exported through this meter, in Wh.
    #[serde(default)]
    pub energy_exported: f64,
    /// Cumulative energy imported through this meter, in Wh.
    #[serde(default)]
    pub energy_imported: f64,
    /// Number of physical units aggregated into this reading.
    #[serde(default)]
    pub num_meters_aggregated: Option<u32>,
}

/// Response of `/api/meters/aggregates`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MeterAggregates {
    pub site: MeterReading,
    pub battery: MeterReading,
    pub load: MeterReading,
    pub solar: MeterReading,
}

/// Response of `/api/system_status/soe`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct StateOfEnergy {
    pub percentage: f64,
}

/// Response of `/api/system_status/grid_status`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GridStatusResponse {
    /// Raw status, e.g. `SystemGridConnected` or `SystemIslandedActive`.
    pub grid_status: String,
    #[serde(default)]
    pub grid_services_active: Option<bool>,
}
