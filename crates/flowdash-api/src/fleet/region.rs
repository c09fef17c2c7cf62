// Fleet API region endpoint
//
// Used during region discovery: the same authenticated request is sent to
// each regional host and the first usable answer wins.

use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::fleet::client::FleetClient;
use crate::fleet::models::RegionInfo;

impl FleetClient {
    /// Ask a specific regional host for the account region, bounded by
    /// `timeout`. Does not change the client's base URL.
    ///
    /// `GET /api/1/users/region`
    pub async fn probe_region(&self, candidate: &Url, timeout: Duration) -> Result<RegionInfo, Error> {
        debug!(%candidate, "probing fleet region");
        self.get_from(candidate, "api/1/users/region", &[], Some(timeout))
            .await
    }
}
