// ── Live energy snapshot ──

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::config::HYSTERESIS_WATTS;

/// Grid connection state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridStatus {
    Connected,
    /// Disconnected from the utility and self-supplying.
    Islanded,
    Inactive,
    /// A status string this client does not classify.
    Other(String),
}

impl GridStatus {
    /// Map the raw gateway/fleet status string.
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "SystemGridConnected" | "Active" => Self::Connected,
            "SystemIslandedActive" => Self::Islanded,
            "Inactive" => Self::Inactive,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn is_off_grid(&self) -> bool {
        matches!(self, Self::Islanded | Self::Inactive)
    }
}

impl fmt::Display for GridStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("connected"),
            Self::Islanded => f.write_str("islanded"),
            Self::Inactive => f.write_str("inactive"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

/// `true` iff the raw status says the site is off the grid.
pub fn is_off_grid(raw: Option<&str>) -> bool {
    raw.is_some_and(|s| GridStatus::from_raw(s).is_off_grid())
}

/// Charging state of a wall connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChargingState {
    Idle,
    PluggedIn,
    Charging,
}

/// One wall connector reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallConnectorReading {
    /// Device identifier (DIN in cloud mode, host in local mode).
    pub id: String,
    pub state: ChargingState,
    pub power_watts: f64,
}

/// Direction of an instantaneous flow after applying the idle margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum FlowDirection {
    /// Within ±[`HYSTERESIS_WATTS`] of zero.
    Idle,
    /// Positive: battery discharging, grid importing, solar producing.
    Forward,
    /// Negative: battery charging, grid exporting.
    Reverse,
}

impl FlowDirection {
    pub fn classify(watts: f64) -> Self {
        if watts > HYSTERESIS_WATTS {
            Self::Forward
        } else if watts < -HYSTERESIS_WATTS {
            Self::Reverse
        } else {
            Self::Idle
        }
    }
}

/// Point-in-time reading of every live power figure for the active site.
///
/// Power values are watts. Immutable once published; updates produce a
/// new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergySnapshot {
    /// Positive when discharging.
    pub battery_power: f64,
    #[serde(default)]
    pub battery_count: Option<u32>,
    #[serde(default)]
    pub battery_percentage: Option<f64>,
    pub load_power: f64,
    pub solar_power: f64,
    /// Cumulative solar energy exported (Wh). Only the gateway meters
    /// report it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solar_energy_exported: Option<f64>,
    /// Grid power at the site meter; positive when importing.
    pub site_power: f64,
    #[serde(default)]
    pub grid_status: Option<GridStatus>,
    #[serde(default)]
    pub wall_connectors: Vec<WallConnectorReading>,
    pub taken_at: DateTime<Utc>,
}

impl EnergySnapshot {
    pub fn is_off_grid(&self) -> bool {
        self.grid_status.as_ref().is_some_and(GridStatus::is_off_grid)
    }

    /// `" · {n}x"` for the battery unit count, empty when unknown or zero.
    pub fn battery_count_label(&self) -> String {
        battery_count_label(self.battery_count)
    }

    pub fn battery_flow(&self) -> FlowDirection {
        FlowDirection::classify(self.battery_power)
    }

    pub fn grid_flow(&self) -> FlowDirection {
        FlowDirection::classify(self.site_power)
    }

    pub fn solar_flow(&self) -> FlowDirection {
        FlowDirection::classify(self.solar_power)
    }

    /// Copy of this snapshot with only the wall connector list replaced.
    pub fn with_wall_connectors(&self, wall_connectors: Vec<WallConnectorReading>) -> Self {
        Self {
            wall_connectors,
            ..self.clone()
        }
    }
}

pub fn battery_count_label(count: Option<u32>) -> String {
    match count {
        Some(n) if n > 0 => format!(" \u{b7} {n}x"),
        _ => String::new(),
    }
}
