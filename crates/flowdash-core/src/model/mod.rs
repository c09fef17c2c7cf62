// ── Domain model ──
//
// Canonical types consumed by the presentation layer. Nothing here knows
// which API a value came from; `crate::convert` does the mapping.

pub mod carbon;
pub mod history;
pub mod site;
pub mod snapshot;

pub use carbon::GridCarbon;
pub use history::{
    FlowEndpoint, HistoricalSeries, HistoryPoint, insert_zero_crossings, interpolate_zero_crossing,
};
pub use site::{EnergySite, SiteInfo, clamp_site_index};
pub use snapshot::{
    ChargingState, EnergySnapshot, FlowDirection, GridStatus, WallConnectorReading,
    battery_count_label, is_off_grid,
};
