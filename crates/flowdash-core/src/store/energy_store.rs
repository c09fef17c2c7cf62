// ── Central reactive energy store ──
//
// Single source of truth for everything the presentation layer shows.
// Writers are the polling tasks; readers subscribe through `watch`
// receivers. Snapshot writes happen inside `send_if_modified`, so the
// closure always sees the latest published value.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use strum::Display;
use tokio::sync::watch;

use super::sequence::RequestSequencer;
use crate::error::CoreError;
use crate::model::{
    EnergySite, EnergySnapshot, GridCarbon, GridStatus, HistoricalSeries, SiteInfo,
    WallConnectorReading, clamp_site_index,
};
use crate::window::HistoryWindow;

/// Loading state of the live snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "lowercase")]
pub enum LoadState {
    /// Nothing requested yet.
    #[default]
    Idle,
    /// First fetch in flight, no snapshot to show.
    Loading,
    /// A snapshot is available (possibly stale).
    Ready,
    /// The first fetch failed; there is nothing to show.
    Failed,
}

/// Primary meter readings from the gateway aggregates endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterReadings {
    pub battery_power: f64,
    pub battery_count: Option<u32>,
    pub load_power: f64,
    pub solar_power: f64,
    pub solar_energy_exported: f64,
    pub site_power: f64,
}

/// Results of one local cycle. Any subset may be present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalReadings {
    pub meters: Option<MeterReadings>,
    pub battery_percentage: Option<f64>,
    pub grid_status: Option<GridStatus>,
}

impl LocalReadings {
    fn into_snapshot(
        self,
        base: Option<&EnergySnapshot>,
        wall_connectors: Vec<WallConnectorReading>,
        taken_at: DateTime<Utc>,
    ) -> Option<EnergySnapshot> {
        let mut snap = match (self.meters, base) {
            (Some(m), base) => EnergySnapshot {
                battery_power: m.battery_power,
                battery_count: m.battery_count,
                battery_percentage: base.and_then(|b| b.battery_percentage),
                load_power: m.load_power,
                solar_power: m.solar_power,
                solar_energy_exported: Some(m.solar_energy_exported),
                site_power: m.site_power,
                grid_status: base.and_then(|b| b.grid_status.clone()),
                wall_connectors: Vec::new(),
                taken_at,
            },
            (None, Some(base)) => base.clone(),
            (None, None) => return None,
        };
        if let Some(pct) = self.battery_percentage {
            snap.battery_percentage = Some(pct);
        }
        if let Some(status) = self.grid_status {
            snap.grid_status = Some(status);
        }
        snap.wall_connectors = wall_connectors;
        Some(snap)
    }
}

/// Which fetch raised the current auxiliary error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxSource {
    WallConnector,
    /// Daily energy, site info, history or carbon data.
    Enrichment,
}

/// Central reactive store for one client.
pub struct EnergyStore {
    pub(crate) snapshot: watch::Sender<Option<Arc<EnergySnapshot>>>,
    /// Latest local wall connector readings, merged into every local snapshot.
    secondary: Mutex<Vec<WallConnectorReading>>,
    pub(crate) error: watch::Sender<Option<Arc<CoreError>>>,
    pub(crate) aux_error: watch::Sender<Option<Arc<CoreError>>>,
    aux_source: Mutex<Option<AuxSource>>,
    pub(crate) load_state: watch::Sender<LoadState>,
    pub(crate) power_history: watch::Sender<Arc<HistoricalSeries>>,
    pub(crate) soe_history: watch::Sender<Arc<HistoricalSeries>>,
    pub(crate) history_window: watch::Sender<Option<HistoryWindow>>,
    pub(crate) sites: watch::Sender<Arc<Vec<EnergySite>>>,
    pub(crate) selected_site: watch::Sender<usize>,
    pub(crate) site_info: watch::Sender<Option<Arc<SiteInfo>>>,
    pub(crate) solar_energy_today: watch::Sender<Option<f64>>,
    pub(crate) carbon: watch::Sender<Option<Arc<GridCarbon>>>,
    pub(crate) snapshot_seq: RequestSequencer,
    pub(crate) secondary_seq: RequestSequencer,
    pub(crate) history_seq: RequestSequencer,
    pub(crate) daily_seq: RequestSequencer,
}

impl Default for EnergyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EnergyStore {
    pub fn new() -> Self {
        Self {
            snapshot: watch::channel(None).0,
            secondary: Mutex::new(Vec::new()),
            error: watch::channel(None).0,
            aux_error: watch::channel(None).0,
            aux_source: Mutex::new(None),
            load_state: watch::channel(LoadState::Idle).0,
            power_history: watch::channel(Arc::new(HistoricalSeries::default())).0,
            soe_history: watch::channel(Arc::new(HistoricalSeries::default())).0,
            history_window: watch::channel(None).0,
            sites: watch::channel(Arc::new(Vec::new())).0,
            selected_site: watch::channel(0).0,
            site_info: watch::channel(None).0,
            solar_energy_today: watch::channel(None).0,
            carbon: watch::channel(None).0,
            snapshot_seq: RequestSequencer::new(),
            secondary_seq: RequestSequencer::new(),
            history_seq: RequestSequencer::new(),
            daily_seq: RequestSequencer::new(),
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn snapshot(&self) -> Option<Arc<EnergySnapshot>> {
        self.snapshot.borrow().clone()
    }

    pub fn error(&self) -> Option<Arc<CoreError>> {
        self.error.borrow().clone()
    }

    pub fn aux_error(&self) -> Option<Arc<CoreError>> {
        self.aux_error.borrow().clone()
    }

    pub fn load_state(&self) -> LoadState {
        *self.load_state.borrow()
    }

    pub fn power_history(&self) -> Arc<HistoricalSeries> {
        self.power_history.borrow().clone()
    }

    pub fn soe_history(&self) -> Arc<HistoricalSeries> {
        self.soe_history.borrow().clone()
    }

    pub fn history_window(&self) -> Option<HistoryWindow> {
        *self.history_window.borrow()
    }

    pub fn sites(&self) -> Arc<Vec<EnergySite>> {
        self.sites.borrow().clone()
    }

    pub fn selected_site_index(&self) -> usize {
        *self.selected_site.borrow()
    }

    /// The selected site, if the list is non-empty.
    pub fn selected_site(&self) -> Option<EnergySite> {
        let index = self.selected_site_index();
        self.sites.borrow().get(index).cloned()
    }

    pub fn site_info(&self) -> Option<Arc<SiteInfo>> {
        self.site_info.borrow().clone()
    }

    pub fn solar_energy_today(&self) -> Option<f64> {
        *self.solar_energy_today.borrow()
    }

    pub fn carbon(&self) -> Option<Arc<GridCarbon>> {
        self.carbon.borrow().clone()
    }

    // ── Snapshot writes ──────────────────────────────────────────────

    /// Replace the snapshot wholesale (cloud mode, demo mode).
    ///
    /// Discarded if a newer request has already been applied.
    pub(crate) fn apply_snapshot(&self, ticket: u64, snap: EnergySnapshot) -> bool {
        let applied = self.snapshot.send_if_modified(|current| {
            if !self.snapshot_seq.try_commit(ticket) {
                return false;
            }
            *current = Some(Arc::new(snap));
            true
        });
        if applied {
            self.mark_ready();
        }
        applied
    }

    /// Apply whatever the local endpoints returned this cycle on top of
    /// the latest snapshot. Without a previous snapshot the meter
    /// readings are required.
    pub(crate) fn apply_local(&self, ticket: u64, readings: LocalReadings) -> bool {
        let taken_at = Utc::now();
        let applied = self.snapshot.send_if_modified(|current| {
            let secondary = self.secondary_readings();
            let Some(next) = readings.into_snapshot(current.as_deref(), secondary, taken_at) else {
                return false;
            };
            if !self.snapshot_seq.try_commit(ticket) {
                return false;
            }
            *current = Some(Arc::new(next));
            true
        });
        if applied {
            self.mark_ready();
        }
        applied
    }

    /// Replace only the wall connector list of the latest snapshot.
    ///
    /// The readings are also kept for local snapshots that arrive later.
    pub(crate) fn apply_secondary(&self, ticket: u64, readings: Vec<WallConnectorReading>) -> bool {
        self.snapshot.send_if_modified(|current| {
            if !self.secondary_seq.try_commit(ticket) {
                return false;
            }
            if let Ok(mut guard) = self.secondary.lock() {
                guard.clone_from(&readings);
            }
            match current {
                Some(snap) => {
                    *current = Some(Arc::new(snap.with_wall_connectors(readings)));
                    true
                }
                None => false,
            }
        })
    }

    fn secondary_readings(&self) -> Vec<WallConnectorReading> {
        self.secondary
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    // ── Status writes ────────────────────────────────────────────────

    /// A fetch is starting; show a loading state if nothing is shown yet.
    pub(crate) fn mark_loading(&self) {
        let has_snapshot = self.snapshot.borrow().is_some();
        self.load_state.send_if_modified(|state| {
            if has_snapshot || *state == LoadState::Loading {
                return false;
            }
            *state = LoadState::Loading;
            true
        });
    }

    fn mark_ready(&self) {
        self.error.send_replace(None);
        self.load_state.send_if_modified(|state| {
            let changed = *state != LoadState::Ready;
            *state = LoadState::Ready;
            changed
        });
    }

    /// Record a failure. The last good snapshot stays in place.
    pub(crate) fn record_error(&self, err: CoreError) {
        let has_snapshot = self.snapshot.borrow().is_some();
        self.error.send_replace(Some(Arc::new(err)));
        if !has_snapshot {
            self.load_state.send_replace(LoadState::Failed);
        }
    }

    pub(crate) fn record_aux_error(&self, source: AuxSource, err: CoreError) {
        if let Ok(mut current) = self.aux_source.lock() {
            *current = Some(source);
        }
        self.aux_error.send_replace(Some(Arc::new(err)));
    }

    /// Clear the auxiliary error, but only if `source` raised it.
    pub(crate) fn clear_aux_error(&self, source: AuxSource) {
        let Ok(mut current) = self.aux_source.lock() else {
            return;
        };
        if *current == Some(source) {
            *current = None;
            self.aux_error.send_replace(None);
        }
    }

    // ── Sites ────────────────────────────────────────────────────────

    /// Install a fresh site list and clamp the selection into it.
    /// Returns the effective index.
    pub(crate) fn set_sites(&self, sites: Vec<EnergySite>, wanted: usize) -> usize {
        let index = clamp_site_index(wanted, sites.len());
        self.sites.send_replace(Arc::new(sites));
        self.selected_site.send_replace(index);
        index
    }

    /// Select a site by index; out-of-range resets to 0.
    pub(crate) fn select_site(&self, wanted: usize) -> usize {
        let index = clamp_site_index(wanted, self.sites.borrow().len());
        self.selected_site.send_replace(index);
        index
    }

    pub(crate) fn set_site_info(&self, info: SiteInfo) {
        self.site_info.send_replace(Some(Arc::new(info)));
    }

    // ── Daily and history ────────────────────────────────────────────

    pub(crate) fn apply_solar_today(&self, ticket: u64, wh: f64) -> bool {
        self.solar_energy_today.send_if_modified(|current| {
            if !self.daily_seq.try_commit(ticket) {
                return false;
            }
            *current = Some(wh);
            true
        })
    }

    pub(crate) fn set_carbon(&self, carbon: GridCarbon) {
        self.carbon.send_replace(Some(Arc::new(carbon)));
    }

    /// Install freshly fetched series for `window`. A `None` series keeps
    /// the previous value for that series only.
    pub(crate) fn apply_history(
        &self,
        ticket: u64,
        window: HistoryWindow,
        power: Option<HistoricalSeries>,
        soe: Option<HistoricalSeries>,
    ) -> bool {
        let applied = self.history_window.send_if_modified(|current| {
            if !self.history_seq.try_commit(ticket) {
                return false;
            }
            *current = Some(window);
            true
        });
        if applied {
            if let Some(power) = power {
                self.power_history.send_replace(Arc::new(power));
            }
            if let Some(soe) = soe {
                self.soe_history.send_replace(Arc::new(soe));
            }
        }
        applied
    }

    /// Drop all per-account data (logout, site change).
    pub(crate) fn reset_site_data(&self) {
        self.snapshot_seq.invalidate();
        self.history_seq.invalidate();
        self.daily_seq.invalidate();
        self.snapshot.send_replace(None);
        self.site_info.send_replace(None);
        self.solar_energy_today.send_replace(None);
        self.power_history
            .send_replace(Arc::new(HistoricalSeries::default()));
        self.soe_history
            .send_replace(Arc::new(HistoricalSeries::default()));
        self.load_state.send_replace(LoadState::Idle);
    }

    pub(crate) fn reset(&self) {
        self.reset_site_data();
        self.secondary_seq.invalidate();
        if let Ok(mut guard) = self.secondary.lock() {
            guard.clear();
        }
        self.sites.send_replace(Arc::new(Vec::new()));
        self.selected_site.send_replace(0);
        self.carbon.send_replace(None);
        self.error.send_replace(None);
        if let Ok(mut current) = self.aux_source.lock() {
            *current = None;
        }
        self.aux_error.send_replace(None);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::ChargingState;

    fn meters(battery: f64) -> MeterReadings {
        MeterReadings {
            battery_power: battery,
            battery_count: Some(1),
            load_power: 500.0,
            solar_power: 2000.0,
            solar_energy_exported: 1.0,
            site_power: 0.0,
        }
    }

    fn charger(power: f64) -> WallConnectorReading {
        WallConnectorReading {
            id: "wc".into(),
            state: ChargingState::Charging,
            power_watts: power,
        }
    }

    #[test]
    fn stale_snapshot_is_discarded() {
        let store = EnergyStore::new();
        let old = store.snapshot_seq.next();
        let new = store.snapshot_seq.next();

        let local = |b| LocalReadings {
            meters: Some(meters(b)),
            ..LocalReadings::default()
        };
        assert!(store.apply_local(new, local(200.0)));
        assert!(!store.apply_local(old, local(100.0)));
        assert_eq!(store.snapshot().unwrap().battery_power, 200.0);
        assert_eq!(store.load_state(), LoadState::Ready);
    }

    #[test]
    fn partial_local_update_keeps_other_fields() {
        let store = EnergyStore::new();
        let t1 = store.snapshot_seq.next();
        store.apply_local(
            t1,
            LocalReadings {
                meters: Some(meters(100.0)),
                battery_percentage: Some(50.0),
                grid_status: Some(GridStatus::Connected),
            },
        );

        // Meters failed this cycle; only the grid status arrived.
        let t2 = store.snapshot_seq.next();
        assert!(store.apply_local(
            t2,
            LocalReadings {
                grid_status: Some(GridStatus::Islanded),
                ..LocalReadings::default()
            },
        ));

        let snap = store.snapshot().unwrap();
        assert_eq!(snap.battery_power, 100.0);
        assert_eq!(snap.battery_percentage, Some(50.0));
        assert!(snap.is_off_grid());
    }

    #[test]
    fn local_update_without_base_needs_meters() {
        let store = EnergyStore::new();
        let ticket = store.snapshot_seq.next();
        assert!(!store.apply_local(
            ticket,
            LocalReadings {
                battery_percentage: Some(80.0),
                ..LocalReadings::default()
            },
        ));
        assert!(store.snapshot().is_none());
    }

    #[test]
    fn secondary_merge_uses_latest_primary_in_either_order() {
        let store = EnergyStore::new();

        // Secondary first: remembered, then attached to the primary.
        let s1 = store.secondary_seq.next();
        assert!(!store.apply_secondary(s1, vec![charger(1000.0)]));
        let p1 = store.snapshot_seq.next();
        store.apply_local(
            p1,
            LocalReadings {
                meters: Some(meters(100.0)),
                ..LocalReadings::default()
            },
        );
        assert_eq!(store.snapshot().unwrap().wall_connectors, vec![charger(1000.0)]);

        // Newer primary, then secondary: primary fields survive.
        let p2 = store.snapshot_seq.next();
        store.apply_local(
            p2,
            LocalReadings {
                meters: Some(meters(300.0)),
                ..LocalReadings::default()
            },
        );
        let s2 = store.secondary_seq.next();
        assert!(store.apply_secondary(s2, vec![charger(3680.0)]));

        let snap = store.snapshot().unwrap();
        assert_eq!(snap.battery_power, 300.0);
        assert_eq!(snap.wall_connectors, vec![charger(3680.0)]);
    }

    #[test]
    fn error_keeps_last_snapshot() {
        let store = EnergyStore::new();
        store.mark_loading();
        assert_eq!(store.load_state(), LoadState::Loading);

        store.record_error(CoreError::NoSiteSelected);
        assert_eq!(store.load_state(), LoadState::Failed);

        let t = store.snapshot_seq.next();
        store.apply_local(
            t,
            LocalReadings {
                meters: Some(meters(1.0)),
                ..LocalReadings::default()
            },
        );
        assert!(store.error().is_none());

        store.record_error(CoreError::Timeout {
            timeout_secs: Some(2),
        });
        assert!(store.snapshot().is_some());
        assert!(store.error().is_some());
        assert_eq!(store.load_state(), LoadState::Ready);
    }

    #[test]
    fn aux_error_is_cleared_only_by_its_source() {
        let store = EnergyStore::new();
        store.record_aux_error(
            AuxSource::Enrichment,
            CoreError::Config {
                message: "no carbon zone".into(),
            },
        );
        store.clear_aux_error(AuxSource::WallConnector);
        assert!(store.aux_error().is_some());

        store.record_aux_error(
            AuxSource::WallConnector,
            CoreError::Timeout {
                timeout_secs: Some(2),
            },
        );
        store.clear_aux_error(AuxSource::WallConnector);
        assert!(store.aux_error().is_none());
    }

    #[test]
    fn site_selection_is_clamped() {
        let store = EnergyStore::new();
        let sites = vec![
            EnergySite {
                id: 1,
                name: "Home".into(),
            },
            EnergySite {
                id: 2,
                name: "Cabin".into(),
            },
        ];
        assert_eq!(store.set_sites(sites.clone(), 1), 1);
        assert_eq!(store.set_sites(sites[..1].to_vec(), 1), 0);
        assert_eq!(store.select_site(5), 0);
        assert_eq!(store.selected_site().map(|s| s.id), Some(1));
    }
}
