// ── Energy source client ──
//
// Owns every network interaction for one dashboard: login, region
// discovery, the fast/slow polling cadences, history navigation and
// site selection. Results land in the `EnergyStore`; consumers only
// read `watch` receivers.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use flowdash_api::{
    CarbonClient, FleetClient, GatewayClient, OAuthClient, TransportConfig, WallConnectorClient,
};
use secrecy::SecretString;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, Credentials, LoginMode};
use crate::convert;
use crate::demo;
use crate::error::CoreError;
use crate::model::{EnergySite, EnergySnapshot, GridCarbon, HistoricalSeries, SiteInfo};
use crate::persistence::{PersistedState, SettingsStore};
use crate::region;
use crate::session::{AuthState, Authorizer, SessionManager, SessionToken};
use crate::store::{AuxSource, EnergyStore, FlightGuard, LoadState, LocalReadings};
use crate::stream::SnapshotStream;
use crate::window::{HistoryWindow, today_so_far};

// ── Backends ─────────────────────────────────────────────────────────

enum Backend {
    Demo,
    Local(LocalBackend),
    Cloud(CloudBackend),
}

struct LocalBackend {
    gateway: GatewayClient,
    wall_connector: Option<WallConnectorClient>,
    host: String,
    username: String,
    password: SecretString,
    logged_in: AtomicBool,
}

struct CloudBackend {
    fleet: FleetClient,
    session: SessionManager,
    /// Region discovery runs once per session.
    region_resolved: AtomicBool,
}

struct CarbonSource {
    client: CarbonClient,
    zone: String,
}

struct Background {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

// ── EnergySourceClient ───────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ClientInner>`. Construct it, call
/// [`connect()`](Self::connect) for the first fetch, then
/// [`start()`](Self::start) to keep the store current in the background.
#[derive(Clone)]
pub struct EnergySourceClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    settings: Arc<dyn SettingsStore>,
    store: Arc<EnergyStore>,
    backend: Backend,
    carbon: Option<CarbonSource>,
    /// Auth state for modes without an OAuth session.
    auth_state: watch::Sender<AuthState>,
    fast_in_flight: AtomicBool,
    slow_in_flight: AtomicBool,
    carbon_in_flight: AtomicBool,
    background: Mutex<Option<Background>>,
}

impl EnergySourceClient {
    /// Build a client from configuration and the persisted state in
    /// `settings`. Does NOT touch the network.
    ///
    /// `authorizer` is the interactive surface for cloud login; without
    /// one, cloud mode works only while a stored refresh token is valid.
    pub fn new(
        config: ClientConfig,
        settings: Arc<dyn SettingsStore>,
        authorizer: Option<Arc<dyn Authorizer>>,
    ) -> Result<Self, CoreError> {
        let persisted = settings.load()?;
        let store = Arc::new(EnergyStore::new());
        store
            .selected_site
            .send_replace(persisted.selected_site_index);

        let backend = build_backend(&config, &persisted, &settings, authorizer)?;
        let carbon = match &config.carbon {
            Some(carbon) => Some(CarbonSource {
                client: CarbonClient::new(
                    carbon.base_url.clone(),
                    &carbon.api_key,
                    &cloud_transport(&config),
                )?,
                zone: carbon.zone.clone(),
            }),
            None => None,
        };

        let auth_state = if matches!(backend, Backend::Demo) {
            AuthState::Ready
        } else {
            AuthState::Unauthenticated
        };

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                settings,
                store,
                backend,
                carbon,
                auth_state: watch::channel(auth_state).0,
                fast_in_flight: AtomicBool::new(false),
                slow_in_flight: AtomicBool::new(false),
                carbon_in_flight: AtomicBool::new(false),
                background: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<EnergyStore> {
        &self.inner.store
    }

    pub fn mode(&self) -> LoginMode {
        self.inner.config.mode()
    }

    pub fn is_demo(&self) -> bool {
        matches!(self.inner.backend, Backend::Demo)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Log in and perform the first fetch.
    ///
    /// Failures of the live snapshot are recorded in the store and
    /// returned. Daily energy and carbon data are fetched alongside;
    /// their failures only set the auxiliary error.
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.refresh().await?;
        let (daily, carbon) = tokio::join!(self.refresh_daily(), self.refresh_carbon());
        for err in [daily.err(), carbon.err()].into_iter().flatten() {
            debug!(error = %err, "enrichment failed during connect");
        }
        info!(mode = %self.mode(), "energy source connected");
        Ok(())
    }

    /// Spawn the fast, slow and carbon polling tasks. A second call while
    /// they run is a no-op.
    pub async fn start(&self) {
        let mut background = self.inner.background.lock().await;
        if background.is_some() {
            return;
        }

        let config = &self.inner.config;
        let cancel = CancellationToken::new();
        let mut handles = Vec::new();

        let client = self.clone();
        handles.push(tokio::spawn(poll_task(
            "live",
            config.fast_interval,
            cancel.clone(),
            move || {
                let client = client.clone();
                async move { client.refresh().await }
            },
        )));

        let client = self.clone();
        handles.push(tokio::spawn(poll_task(
            "daily",
            config.slow_interval,
            cancel.clone(),
            move || {
                let client = client.clone();
                async move { client.refresh_daily().await }
            },
        )));

        if self.inner.carbon.is_some() {
            let client = self.clone();
            handles.push(tokio::spawn(poll_task(
                "carbon",
                config.carbon_interval,
                cancel.clone(),
                move || {
                    let client = client.clone();
                    async move { client.refresh_carbon().await }
                },
            )));
        }

        debug!(tasks = handles.len(), "polling started");
        *background = Some(Background { cancel, handles });
    }

    /// Cancel the polling tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        let Some(background) = self.inner.background.lock().await.take() else {
            return;
        };
        background.cancel.cancel();
        for handle in background.handles {
            let _ = handle.await;
        }
        debug!("polling stopped");
    }

    /// Forget the session: tokens, cached data and the gateway login.
    pub async fn logout(&self) {
        self.shutdown().await;
        match &self.inner.backend {
            Backend::Cloud(cloud) => {
                cloud.session.clear();
                cloud.fleet.clear_access_token();
            }
            Backend::Local(local) => {
                local.logged_in.store(false, Ordering::SeqCst);
                self.inner.auth_state.send_replace(AuthState::Unauthenticated);
            }
            Backend::Demo => {}
        }
        self.inner.store.reset();
        info!("logged out");
    }

    // ── Cadences ─────────────────────────────────────────────────────

    /// One fast cycle: the live snapshot plus the wall connector.
    ///
    /// Skipped (returns `Ok`) while a previous cycle is still running.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let Some(_guard) = FlightGuard::try_acquire(&self.inner.fast_in_flight) else {
            debug!("live refresh still in flight; skipping");
            return Ok(());
        };
        self.live_cycle().await
    }

    /// One slow cycle: today's solar energy (cloud) or nothing.
    pub async fn refresh_daily(&self) -> Result<(), CoreError> {
        let Some(_guard) = FlightGuard::try_acquire(&self.inner.slow_in_flight) else {
            debug!("daily refresh still in flight; skipping");
            return Ok(());
        };
        self.daily_cycle().await
    }

    /// Fetch grid carbon data, if configured.
    pub async fn refresh_carbon(&self) -> Result<(), CoreError> {
        let Some(carbon) = self.inner.carbon.as_ref() else {
            return Ok(());
        };
        let Some(_guard) = FlightGuard::try_acquire(&self.inner.carbon_in_flight) else {
            debug!("carbon refresh still in flight; skipping");
            return Ok(());
        };

        let (intensity, breakdown) = tokio::join!(
            carbon.client.latest_carbon_intensity(&carbon.zone),
            carbon.client.latest_power_breakdown(&carbon.zone),
        );
        let result = match (intensity, breakdown) {
            (Err(e), Err(_)) => Err(CoreError::from(e)),
            (intensity, breakdown) => {
                if let Err(e) = &intensity {
                    warn!(error = %e, "carbon intensity unavailable");
                }
                if let Err(e) = &breakdown {
                    warn!(error = %e, "power breakdown unavailable");
                }
                self.inner.store.set_carbon(convert::grid_carbon(
                    &carbon.zone,
                    intensity.as_ref().ok(),
                    breakdown.as_ref().ok(),
                    Utc::now(),
                ));
                Ok(())
            }
        };
        self.record_aux(result)
    }

    // ── History ──────────────────────────────────────────────────────

    /// Load the 24 hour window ending at `end`.
    pub async fn fetch_history(&self, end: DateTime<Utc>) -> Result<(), CoreError> {
        let window = HistoryWindow::ending_at(end, Utc::now(), self.inner.config.time_zone);
        self.load_history(window).await
    }

    /// Step the history window one day back.
    pub async fn previous_day(&self) -> Result<(), CoreError> {
        let now = Utc::now();
        let window = self.current_window(now).previous(now);
        self.load_history(window).await
    }

    /// Step the history window one day forward, never past now.
    pub async fn next_day(&self) -> Result<(), CoreError> {
        let now = Utc::now();
        let window = self.current_window(now).next(now);
        self.load_history(window).await
    }

    /// "Today", "Yesterday" or a medium date for the loaded window.
    pub fn history_label(&self) -> Option<String> {
        self.inner
            .store
            .history_window()
            .map(|w| w.label(Utc::now()))
    }

    // ── Sites ────────────────────────────────────────────────────────

    /// Switch to another energy site and reload everything for it.
    /// Out-of-range indices select the first site.
    pub async fn select_site(&self, index: usize) -> Result<usize, CoreError> {
        let Backend::Cloud(cloud) = &self.inner.backend else {
            return Err(CoreError::Config {
                message: "site selection is only available in cloud mode".into(),
            });
        };

        let store = &self.inner.store;
        let index = store.select_site(index);
        store.reset_site_data();
        self.persist(&mut |state: &mut PersistedState| state.selected_site_index = index);
        info!(index, "energy site selected");

        self.load_site_info(cloud).await;
        let live = self.record(self.cloud_cycle(cloud).await);
        let _ = self.daily_cycle().await;
        if let Some(window) = store.history_window() {
            self.load_history(window).await?;
        }
        live.map(|()| index)
    }

    // ── Observables ──────────────────────────────────────────────────

    pub fn snapshot(&self) -> watch::Receiver<Option<Arc<EnergySnapshot>>> {
        self.inner.store.snapshot.subscribe()
    }

    pub fn snapshot_stream(&self) -> SnapshotStream {
        SnapshotStream::new(self.snapshot())
    }

    pub fn error(&self) -> watch::Receiver<Option<Arc<CoreError>>> {
        self.inner.store.error.subscribe()
    }

    pub fn aux_error(&self) -> watch::Receiver<Option<Arc<CoreError>>> {
        self.inner.store.aux_error.subscribe()
    }

    pub fn load_state(&self) -> watch::Receiver<LoadState> {
        self.inner.store.load_state.subscribe()
    }

    pub fn auth_state(&self) -> watch::Receiver<AuthState> {
        match &self.inner.backend {
            Backend::Cloud(cloud) => cloud.session.auth_state(),
            Backend::Local(_) | Backend::Demo => self.inner.auth_state.subscribe(),
        }
    }

    pub fn power_history(&self) -> watch::Receiver<Arc<HistoricalSeries>> {
        self.inner.store.power_history.subscribe()
    }

    pub fn soe_history(&self) -> watch::Receiver<Arc<HistoricalSeries>> {
        self.inner.store.soe_history.subscribe()
    }

    pub fn sites(&self) -> watch::Receiver<Arc<Vec<EnergySite>>> {
        self.inner.store.sites.subscribe()
    }

    pub fn selected_site(&self) -> watch::Receiver<usize> {
        self.inner.store.selected_site.subscribe()
    }

    pub fn site_info(&self) -> watch::Receiver<Option<Arc<SiteInfo>>> {
        self.inner.store.site_info.subscribe()
    }

    pub fn solar_energy_today(&self) -> watch::Receiver<Option<f64>> {
        self.inner.store.solar_energy_today.subscribe()
    }

    pub fn carbon(&self) -> watch::Receiver<Option<Arc<GridCarbon>>> {
        self.inner.store.carbon.subscribe()
    }

    // ── Cycles ───────────────────────────────────────────────────────

    async fn live_cycle(&self) -> Result<(), CoreError> {
        self.inner.store.mark_loading();
        let result = match &self.inner.backend {
            Backend::Demo => {
                self.apply_demo();
                Ok(())
            }
            Backend::Local(local) => self.local_cycle(local).await,
            Backend::Cloud(cloud) => self.cloud_cycle(cloud).await,
        };
        self.record(result)
    }

    async fn daily_cycle(&self) -> Result<(), CoreError> {
        let result = match &self.inner.backend {
            Backend::Demo => {
                let ticket = self.inner.store.daily_seq.next();
                self.inner
                    .store
                    .apply_solar_today(ticket, demo::SOLAR_ENERGY_TODAY_WH);
                Ok(())
            }
            Backend::Local(_) => Ok(()),
            Backend::Cloud(cloud) => self.cloud_daily(cloud).await,
        };
        self.record_aux(result)
    }

    fn apply_demo(&self) {
        let store = &self.inner.store;
        let ticket = store.snapshot_seq.next();
        store.apply_snapshot(ticket, demo::snapshot(Utc::now()));
        if store.site_info().is_none() {
            store.set_site_info(demo::site_info());
        }
    }

    // ── Local mode ───────────────────────────────────────────────────

    async fn local_cycle(&self, local: &LocalBackend) -> Result<(), CoreError> {
        let primary = async {
            let fresh = !local.logged_in.load(Ordering::SeqCst);
            if fresh {
                self.local_login(local).await?;
            }
            match self.fetch_local(local).await {
                Err(e) if e.is_auth() && !fresh => {
                    info!(error = %e, "gateway session expired, logging in again");
                    self.local_login(local).await?;
                    self.fetch_local(local).await
                }
                result => result,
            }
        };
        let ((), result) = tokio::join!(self.fetch_wall_connector(local), primary);
        result
    }

    async fn local_login(&self, local: &LocalBackend) -> Result<(), CoreError> {
        self.inner.auth_state.send_replace(AuthState::Authorizing);
        if let Err(e) = local.gateway.login(&local.username, &local.password).await {
            self.inner
                .auth_state
                .send_replace(AuthState::Unauthenticated);
            warn!(error = %e, "gateway login failed");
            return Err(login_error(e));
        }

        local.logged_in.store(true, Ordering::SeqCst);
        self.inner.auth_state.send_replace(AuthState::Ready);
        info!(host = %local.host, "logged in to gateway");

        let host = local.host.clone();
        let username = local.username.clone();
        let wall_connector = local
            .wall_connector
            .as_ref()
            .and_then(|wc| wc.base_url().host_str().map(str::to_owned));
        self.persist(&mut |state: &mut PersistedState| {
            state.login_mode = LoginMode::Local;
            state.gateway_host = Some(host.clone());
            state.username = Some(username.clone());
            if wall_connector.is_some() {
                state.wall_connector_host.clone_from(&wall_connector);
            }
        });
        Ok(())
    }

    /// The three status endpoints, concurrently. Whatever succeeds is
    /// applied; the first failure is returned.
    async fn fetch_local(&self, local: &LocalBackend) -> Result<(), CoreError> {
        let store = &self.inner.store;
        let ticket = store.snapshot_seq.next();
        let gateway = &local.gateway;
        let (meters, soe, grid) = tokio::join!(
            gateway.get_meter_aggregates(),
            gateway.get_state_of_energy(),
            gateway.get_grid_status(),
        );

        let mut readings = LocalReadings::default();
        let mut first_error: Option<CoreError> = None;
        match meters {
            Ok(raw) => readings.meters = Some(convert::meter_readings(&raw)),
            Err(e) => {
                warn!(error = %e, "meter aggregates unavailable");
                first_error.get_or_insert(e.into());
            }
        }
        match soe {
            Ok(raw) => readings.battery_percentage = Some(raw.percentage),
            Err(e) => {
                warn!(error = %e, "state of energy unavailable");
                first_error.get_or_insert(e.into());
            }
        }
        match grid {
            Ok(raw) => readings.grid_status = Some(convert::grid_status(&raw)),
            Err(e) => {
                warn!(error = %e, "grid status unavailable");
                first_error.get_or_insert(e.into());
            }
        }

        store.apply_local(ticket, readings);
        match first_error {
            Some(e) => {
                if e.is_auth() {
                    local.logged_in.store(false, Ordering::SeqCst);
                }
                Err(e)
            }
            None => Ok(()),
        }
    }

    async fn fetch_wall_connector(&self, local: &LocalBackend) {
        let Some(wall_connector) = local.wall_connector.as_ref() else {
            return;
        };
        let store = &self.inner.store;
        let ticket = store.secondary_seq.next();
        match wall_connector.get_vitals().await {
            Ok(vitals) => {
                let id = wall_connector
                    .base_url()
                    .host_str()
                    .unwrap_or_default()
                    .to_owned();
                store.apply_secondary(ticket, vec![convert::local_wall_connector(&id, &vitals)]);
                store.clear_aux_error(AuxSource::WallConnector);
            }
            Err(e) => {
                warn!(error = %e, "wall connector unavailable");
                store.record_aux_error(AuxSource::WallConnector, e.into());
            }
        }
    }

    // ── Cloud mode ───────────────────────────────────────────────────

    async fn cloud_cycle(&self, cloud: &CloudBackend) -> Result<(), CoreError> {
        self.authorize_fleet(cloud).await?;

        if !cloud.region_resolved.load(Ordering::SeqCst) {
            self.resolve_region(cloud).await?;
        }
        if self.inner.store.sites().is_empty() {
            self.load_sites(cloud).await?;
            self.load_site_info(cloud).await;
        }

        // Ticket before site id: a site change in between invalidates it.
        let store = &self.inner.store;
        let ticket = store.snapshot_seq.next();
        let site_id = self.selected_site_id()?;
        let live = cloud
            .fleet
            .live_status(site_id)
            .await
            .map_err(|e| self.cloud_error(cloud, e))?;

        let battery_count = store.site_info().and_then(|info| info.battery_count);
        store.apply_snapshot(ticket, convert::live_snapshot(&live, battery_count));
        Ok(())
    }

    /// Install a token valid for the fleet client's current audience.
    async fn authorize_fleet(&self, cloud: &CloudBackend) -> Result<(), CoreError> {
        let audience = cloud.fleet.base_url();
        let token = cloud.session.ensure_token(&audience).await?;
        cloud.fleet.set_access_token(token.access_token);
        Ok(())
    }

    async fn resolve_region(&self, cloud: &CloudBackend) -> Result<(), CoreError> {
        let config = &self.inner.config;
        let resolved = region::resolve_base_url(
            &cloud.fleet,
            &config.region_candidates,
            config.region_probe_timeout,
        )
        .await;
        cloud.region_resolved.store(true, Ordering::SeqCst);

        let Some(url) = resolved else {
            return Ok(());
        };
        if url != *cloud.fleet.base_url() {
            cloud.fleet.set_base_url(url.clone());
        }
        self.persist(&mut |state: &mut PersistedState| {
            state.login_mode = LoginMode::Cloud;
            state.fleet_base_url = Some(url.clone());
        });

        // The token may have been issued for another region.
        self.authorize_fleet(cloud).await
    }

    async fn load_sites(&self, cloud: &CloudBackend) -> Result<(), CoreError> {
        let products = cloud
            .fleet
            .list_products()
            .await
            .map_err(|e| self.cloud_error(cloud, e))?;
        let sites = convert::energy_sites(&products);
        if sites.is_empty() {
            return Err(CoreError::NoSiteSelected);
        }

        let store = &self.inner.store;
        let wanted = store.selected_site_index();
        let index = store.set_sites(sites, wanted);
        info!(sites = store.sites().len(), index, "energy sites loaded");
        if index != wanted {
            self.persist(&mut |state: &mut PersistedState| state.selected_site_index = index);
        }
        Ok(())
    }

    /// Site metadata; failure only sets the auxiliary error.
    async fn load_site_info(&self, cloud: &CloudBackend) {
        let Ok(site_id) = self.selected_site_id() else {
            return;
        };
        match cloud.fleet.site_info(site_id).await {
            Ok(raw) => self.inner.store.set_site_info(convert::site_info(raw)),
            Err(e) => {
                warn!(site_id, error = %e, "site info unavailable");
                let err = self.cloud_error(cloud, e);
                self.inner.store.record_aux_error(AuxSource::Enrichment, err);
            }
        }
    }

    async fn cloud_daily(&self, cloud: &CloudBackend) -> Result<(), CoreError> {
        if self.inner.store.sites().is_empty() {
            return Ok(());
        }
        self.authorize_fleet(cloud).await?;

        let store = &self.inner.store;
        let window = today_so_far(Utc::now(), self.inner.config.time_zone);
        let ticket = store.daily_seq.next();
        let site_id = self.selected_site_id()?;
        let entries = cloud
            .fleet
            .energy_history(site_id, &window.query())
            .await
            .map_err(|e| self.cloud_error(cloud, e))?;
        store.apply_solar_today(ticket, convert::solar_energy_total(&entries));
        Ok(())
    }

    async fn load_history(&self, window: HistoryWindow) -> Result<(), CoreError> {
        let store = &self.inner.store;
        let ticket = store.history_seq.next();

        let result = match &self.inner.backend {
            Backend::Demo => {
                let (power, soe) = demo::history(&window);
                store.apply_history(ticket, window, Some(power), Some(soe));
                Ok(())
            }
            Backend::Local(_) => Err(CoreError::Config {
                message: "history is only available in cloud mode".into(),
            }),
            Backend::Cloud(cloud) => self.cloud_history(cloud, ticket, window).await,
        };
        self.record_aux(result)
    }

    async fn cloud_history(
        &self,
        cloud: &CloudBackend,
        ticket: u64,
        window: HistoryWindow,
    ) -> Result<(), CoreError> {
        self.authorize_fleet(cloud).await?;
        let site_id = self.selected_site_id()?;
        let query = window.query();

        let (energy, soe) = tokio::join!(
            cloud.fleet.energy_history(site_id, &query),
            cloud.fleet.soe_history(site_id, &query),
        );
        let mut first_error = None;
        let power = match energy {
            Ok(entries) => Some(convert::power_series(&entries)),
            Err(e) => {
                first_error.get_or_insert(self.cloud_error(cloud, e));
                None
            }
        };
        let soe = match soe {
            Ok(entries) => Some(convert::soe_series(&entries)),
            Err(e) => {
                first_error.get_or_insert(self.cloud_error(cloud, e));
                None
            }
        };

        if power.is_some() || soe.is_some() {
            self.inner.store.apply_history(ticket, window, power, soe);
        }
        first_error.map_or(Ok(()), Err)
    }

    fn selected_site_id(&self) -> Result<u64, CoreError> {
        self.inner
            .store
            .selected_site()
            .map(|site| site.id)
            .ok_or(CoreError::NoSiteSelected)
    }

    /// Convert a fleet error; a rejected token is marked expired so the
    /// next request refreshes it.
    fn cloud_error(&self, cloud: &CloudBackend, err: flowdash_api::Error) -> CoreError {
        if err.is_auth_expired() {
            cloud.session.expire();
        }
        err.into()
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn current_window(&self, now: DateTime<Utc>) -> HistoryWindow {
        self.inner
            .store
            .history_window()
            .unwrap_or_else(|| HistoryWindow::ending_at(now, now, self.inner.config.time_zone))
    }

    fn record(&self, result: Result<(), CoreError>) -> Result<(), CoreError> {
        if let Err(e) = &result {
            self.inner.store.record_error(e.clone());
        }
        result
    }

    fn record_aux(&self, result: Result<(), CoreError>) -> Result<(), CoreError> {
        if let Err(e) = &result {
            self.inner.store.record_aux_error(AuxSource::Enrichment, e.clone());
        }
        result
    }

    fn persist(&self, apply: &mut dyn FnMut(&mut PersistedState)) {
        if let Err(e) = self.inner.settings.update(apply) {
            warn!(error = %e, "failed to persist settings");
        }
    }
}

// ── Construction helpers ─────────────────────────────────────────────

fn build_backend(
    config: &ClientConfig,
    persisted: &PersistedState,
    settings: &Arc<dyn SettingsStore>,
    authorizer: Option<Arc<dyn Authorizer>>,
) -> Result<Backend, CoreError> {
    if config.credentials.is_demo() {
        info!("using demo data");
        return Ok(Backend::Demo);
    }

    match &config.credentials {
        Credentials::Local {
            host,
            username,
            password,
        } => {
            let host = host.trim();
            if host.is_empty() {
                return Err(CoreError::Config {
                    message: "gateway host is not configured".into(),
                });
            }
            let gateway = GatewayClient::new(host, &TransportConfig::local_gateway(config.timeout))?;
            let wall_connector = config
                .wall_connector_host
                .as_deref()
                .or(persisted.wall_connector_host.as_deref())
                .filter(|h| !h.trim().is_empty())
                .map(|h| WallConnectorClient::new(h, &local_device_transport(config)))
                .transpose()?;

            Ok(Backend::Local(LocalBackend {
                gateway,
                wall_connector,
                host: host.to_owned(),
                username: username.clone(),
                password: password.clone(),
                logged_in: AtomicBool::new(false),
            }))
        }
        Credentials::Cloud(credentials) => {
            let transport = cloud_transport(config);
            let initial = SessionToken::from_persisted(persisted);
            // Before discovery, talk to the host the stored token was issued for.
            let base_url = persisted
                .fleet_base_url
                .clone()
                .or_else(|| initial.as_ref().map(|t| t.audience.clone()))
                .unwrap_or_else(|| config.fleet_base_url.clone());
            let fleet = FleetClient::new(base_url, &transport)?;
            let oauth = OAuthClient::new(credentials.oauth_config(), &transport)?;

            if let Some(token) = &initial {
                fleet.set_access_token(token.access_token.clone());
            }
            let session = SessionManager::new(oauth, authorizer, Arc::clone(settings), initial);

            Ok(Backend::Cloud(CloudBackend {
                fleet,
                session,
                region_resolved: AtomicBool::new(persisted.fleet_base_url.is_some()),
            }))
        }
    }
}

fn cloud_transport(config: &ClientConfig) -> TransportConfig {
    TransportConfig {
        tls: config.tls.to_transport(),
        timeout: config.timeout,
        cookie_jar: None,
    }
}

fn local_device_transport(config: &ClientConfig) -> TransportConfig {
    TransportConfig {
        tls: flowdash_api::TlsMode::DangerAcceptInvalid,
        timeout: config.timeout,
        cookie_jar: None,
    }
}

/// Every gateway login failure surfaces as "login failed".
fn login_error(err: flowdash_api::Error) -> CoreError {
    match CoreError::from(err) {
        login @ CoreError::LoginFailed { .. } => login,
        other => CoreError::LoginFailed {
            message: other.to_string(),
        },
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Run `cycle` every `period` until cancelled.
///
/// Each tick spawns the cycle so the timer keeps its cadence; the
/// cycle's own in-flight guard turns overlapping ticks into no-ops.
async fn poll_task<F, Fut>(label: &'static str, period: Duration, cancel: CancellationToken, cycle: F)
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), CoreError>> + Send + 'static,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let run = cycle();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {}
                        result = run => {
                            if let Err(e) = result {
                                warn!(task = label, error = %e, "periodic refresh failed");
                            }
                        }
                    }
                });
            }
        }
    }
    debug!(task = label, "poll task stopped");
}
