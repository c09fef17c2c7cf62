// flowdash-api: Async Rust clients for the local energy gateway, the
// wall connector, the cloud fleet API (with OAuth2), and grid carbon data.

pub mod carbon;
pub mod error;
pub mod fleet;
pub mod gateway;
pub mod oauth;
mod response;
pub mod transport;
pub mod wall_connector;

pub use carbon::CarbonClient;
pub use error::Error;
pub use fleet::FleetClient;
pub use gateway::GatewayClient;
pub use oauth::{AuthorizationRequest, OAuthClient, OAuthConfig, TokenResponse};
pub use transport::{TlsMode, TransportConfig};
pub use wall_connector::{Vitals, WallConnectorClient};
