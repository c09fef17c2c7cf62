// Local gateway authentication
//
// Cookie-based login. The login endpoint sets `AuthCookie` in the client's
// jar; subsequent requests use that cookie automatically. A response
// without the cookie is a failed login even when the status is 200.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::debug;

use crate::error::Error;
use crate::gateway::client::GatewayClient;

/// Name of the session cookie the gateway sets on a successful login.
pub const SESSION_COOKIE: &str = "AuthCookie";

/// Account name the gateway expects for customer logins.
const CUSTOMER_ACCOUNT: &str = "customer";

impl GatewayClient {
    /// Authenticate with the gateway.
    ///
    /// `POST /api/login/Basic` with the customer account, the configured
    /// e-mail, and the gateway password. Succeeds only if the response sets
    /// [`SESSION_COOKIE`].
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<(), Error> {
        let url = self.api_url("api/login/Basic")?;
        debug!("logging in at {}", url);

        let body = json!({
            "username": CUSTOMER_ACCOUNT,
            "password": password.expose_secret(),
            "email": email,
            "force_sm_off": false,
        });

        let resp = self
            .http()
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status}): {body}"),
            });
        }

        if !resp.cookies().any(|c| c.name() == SESSION_COOKIE) {
            return Err(Error::MissingSessionCookie {
                cookie: SESSION_COOKIE,
            });
        }

        debug!("login successful");
        Ok(())
    }
}
