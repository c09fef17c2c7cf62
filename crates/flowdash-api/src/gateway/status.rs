// Local gateway status endpoints
//
// Instantaneous meter readings, battery state of energy, and grid status.
// Each is an independent GET so callers can fetch them concurrently.

use tracing::debug;

use crate::error::Error;
use crate::gateway::client::GatewayClient;
use crate::gateway::models::{GridStatusResponse, MeterAggregates, StateOfEnergy};

impl GatewayClient {
    /// Aggregated instantaneous power per meter.
    ///
    /// `GET /api/meters/aggregates`
    pub async fn get_meter_aggregates(&self) -> Result<MeterAggregates, Error> {
        debug!("fetching meter aggregates");
        self.get("api/meters/aggregates").await
    }

    /// Battery state of energy as a percentage.
    ///
    /// `GET /api/system_status/soe`
    pub async fn get_state_of_energy(&self) -> Result<StateOfEnergy, Error> {
        debug!("fetching battery state of energy");
        self.get("api/system_status/soe").await
    }

    /// Grid connection status string.
    ///
    /// `GET /api/system_status/grid_status`
    pub async fn get_grid_status(&self) -> Result<GridStatusResponse, Error> {
        debug!("fetching grid status");
        self.get("api/system_status/grid_status").await
    }
}
