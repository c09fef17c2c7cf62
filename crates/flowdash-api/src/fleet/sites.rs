// Fleet API energy site endpoints
//
// Live status, static site info, and calendar history for one site.

use chrono::{DateTime, FixedOffset};
use tracing::debug;

use crate::error::Error;
use crate::fleet::client::FleetClient;
use crate::fleet::models::{
    CalendarHistory, EnergyHistoryEntry, LiveStatus, SiteInfo, SoeHistoryEntry,
};

/// Date window and zone for a calendar history request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    /// IANA zone name the server buckets intervals in.
    pub time_zone: String,
}

impl HistoryQuery {
    fn params(&self, kind: &str) -> Vec<(&'static str, String)> {
        vec![
            ("kind", kind.to_owned()),
            ("period", "day".to_owned()),
            ("start_date", self.start.to_rfc3339()),
            ("end_date", self.end.to_rfc3339()),
            ("time_zone", self.time_zone.clone()),
        ]
    }
}

impl FleetClient {
    /// Live power readings for a site.
    ///
    /// `GET /api/1/energy_sites/{id}/live_status`
    pub async fn live_status(&self, site_id: u64) -> Result<LiveStatus, Error> {
        debug!(site_id, "fetching live status");
        self.get(&format!("api/1/energy_sites/{site_id}/live_status"))
            .await
    }

    /// Static metadata for a site.
    ///
    /// `GET /api/1/energy_sites/{id}/site_info`
    pub async fn site_info(&self, site_id: u64) -> Result<SiteInfo, Error> {
        debug!(site_id, "fetching site info");
        self.get(&format!("api/1/energy_sites/{site_id}/site_info"))
            .await
    }

    /// Energy flow deltas for the window.
    ///
    /// `GET /api/1/energy_sites/{id}/calendar_history?kind=energy`
    pub async fn energy_history(
        &self,
        site_id: u64,
        query: &HistoryQuery,
    ) -> Result<Vec<EnergyHistoryEntry>, Error> {
        debug!(site_id, start = %query.start, end = %query.end, "fetching energy history");
        let history: CalendarHistory<EnergyHistoryEntry> = self
            .get_with_params(
                &format!("api/1/energy_sites/{site_id}/calendar_history"),
                &query.params("energy"),
            )
            .await?;
        Ok(history.time_series)
    }

    /// Battery state-of-energy samples for the window.
    ///
    /// `GET /api/1/energy_sites/{id}/calendar_history?kind=soe`
    pub async fn soe_history(
        &self,
        site_id: u64,
        query: &HistoryQuery,
    ) -> Result<Vec<SoeHistoryEntry>, Error> {
        debug!(site_id, start = %query.start, end = %query.end, "fetching soe history");
        let history: CalendarHistory<SoeHistoryEntry> = self
            .get_with_params(
                &format!("api/1/energy_sites/{site_id}/calendar_history"),
                &query.params("soe"),
            )
            .await?;
        Ok(history.time_series)
    }
}
