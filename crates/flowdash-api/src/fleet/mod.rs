// Fleet (cloud) API client modules
//
// Bearer-token client for the vendor's regional fleet API. Every JSON
// payload is wrapped in a `{ "response": ... }` envelope which the client
// strips before returning.

pub mod client;
pub mod models;
pub mod products;
pub mod region;
pub mod sites;

pub use client::FleetClient;

/// Regional fleet API hosts, probed in this order during region discovery.
pub const REGIONAL_BASE_URLS: &[&str] = &[
    "https://fleet-api.prd.na.vn.cloud.tesla.com",
    "https://fleet-api.prd.eu.vn.cloud.tesla.com",
    "https://fleet-api.prd.cn.vn.cloud.tesla.cn",
];
