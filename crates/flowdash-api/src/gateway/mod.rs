// Local gateway API client modules
//
// Hand-written client for the on-site gateway's REST API. Login is
// cookie-based (`AuthCookie`); the status endpoints are plain JSON GETs.

pub mod auth;
pub mod client;
pub mod models;
pub mod status;

pub use client::GatewayClient;
