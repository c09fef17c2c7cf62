// ── Energy sites (cloud mode) ──

use serde::{Deserialize, Serialize};

/// A selectable installation linked to the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergySite {
    pub id: u64,
    pub name: String,
}

/// Static metadata for the selected site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteInfo {
    pub name: Option<String>,
    pub battery_count: Option<u32>,
    pub firmware_version: Option<String>,
    pub installation_date: Option<String>,
    /// Nameplate power (W).
    pub nameplate_power: Option<f64>,
    /// IANA zone the installation reports, if any.
    pub time_zone: Option<String>,
}

/// Clamp a stored selection into the current site list.
///
/// An index at or beyond the list length falls back to the first site.
pub fn clamp_site_index(index: usize, site_count: usize) -> usize {
    if index < site_count { index } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_index_resets_to_zero() {
        assert_eq!(clamp_site_index(1, 3), 1);
        assert_eq!(clamp_site_index(3, 3), 0);
        assert_eq!(clamp_site_index(7, 2), 0);
        assert_eq!(clamp_site_index(0, 0), 0);
    }
}
