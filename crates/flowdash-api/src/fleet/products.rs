// Fleet API product listing

use tracing::debug;

use crate::error::Error;
use crate::fleet::client::FleetClient;
use crate::fleet::models::Product;

impl FleetClient {
    /// All products (vehicles and energy sites) linked to the account.
    ///
    /// `GET /api/1/products`
    pub async fn list_products(&self) -> Result<Vec<Product>, Error> {
        debug!("listing products");
        self.get("api/1/products").await
    }
}
