use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Grid carbon data for the configured zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCarbon {
    pub zone: String,
    /// gCO2eq/kWh.
    pub carbon_intensity: Option<f64>,
    /// Share of fossil generation in the grid mix (%).
    pub fossil_fuel_percentage: Option<f64>,
    pub fetched_at: DateTime<Utc>,
}
