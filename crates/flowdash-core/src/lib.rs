//! Session handling, polling and reactive energy-flow state for flowdash.
//!
//! This crate sits between `flowdash-api` and the presentation layer:
//!
//! - **[`EnergySourceClient`]**: owns all network interaction. It logs in
//!   to the local gateway (cookie session) or the cloud fleet API (OAuth2),
//!   resolves the account's region, and polls on a fast cadence (live
//!   snapshot, wall connector) and a slow one (daily energy, carbon data).
//!
//! - **[`EnergyStore`]**: `tokio::sync::watch` channels holding the latest
//!   snapshot, errors, loading state, history series, sites and
//!   enrichment data. Writes are sequence-guarded so a late response
//!   never replaces a newer one.
//!
//! - **[`SessionManager`]**: the OAuth token lifecycle: authorize, exchange,
//!   refresh, and one audience correction per session. The interactive part
//!   is injected as an [`Authorizer`].
//!
//! - **[`SettingsStore`]**: persistence port for tokens, the resolved base
//!   URL, the selected site and display preferences.
//!
//! - **Domain model** ([`model`]): immutable snapshots, history series and
//!   the pure helpers the dashboard relies on (off-grid detection, battery
//!   labels, zero-crossing interpolation).

pub mod client;
pub mod config;
mod convert;
mod demo;
pub mod error;
pub mod model;
pub mod persistence;
pub mod region;
pub mod session;
pub mod store;
pub mod stream;
pub mod window;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::EnergySourceClient;
pub use config::{
    CarbonSettings, ClientConfig, CloudCredentials, Credentials, DEMO_HOST, HYSTERESIS_WATTS,
    LoginMode, TlsVerification,
};
pub use error::{CoreError, ErrorKind};
pub use persistence::{DisplayPrefs, MemorySettings, PersistedState, SettingsStore};
pub use session::{AuthState, Authorizer, SessionManager, SessionToken};
pub use store::{EnergyStore, LoadState};
pub use stream::SnapshotStream;
pub use window::{HistoryWindow, date_label};

pub use model::{
    ChargingState, EnergySite, EnergySnapshot, FlowDirection, FlowEndpoint, GridCarbon,
    GridStatus, HistoricalSeries, HistoryPoint, SiteInfo, WallConnectorReading,
    battery_count_label, insert_zero_crossings, interpolate_zero_crossing, is_off_grid,
};
