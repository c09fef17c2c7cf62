// ── Cloud session manager ──
//
// Owns the OAuth token for cloud mode and keeps it usable:
//
//   Unauthenticated -> Authorizing -> Exchanging -> Ready
//   Ready -> Refreshing -> Ready
//
// A failed refresh falls back to a full authorization. Authorization and
// exchange failures return to `Unauthenticated` with the error. Flows are
// serialized; a logout while a flow is in flight discards its result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use flowdash_api::{OAuthClient, TokenResponse};
use secrecy::SecretString;
use strum::Display;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::LoginMode;
use crate::error::CoreError;
use crate::persistence::{PersistedState, SettingsStore};

/// A token expiring within this margin counts as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Authentication progress, observable by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "lowercase")]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Authorizing,
    Exchanging,
    Ready,
    Refreshing,
}

/// Interactive surface that shows the authorize page to the user.
///
/// Implementations open `authorize_url` (browser, terminal prompt, web
/// view) and return the redirect URL the authorization server sent the
/// user to, query string included.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, authorize_url: &Url) -> Result<Url, CoreError>;
}

/// Access token plus what is needed to keep it valid.
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Fleet base URL the token was issued for.
    pub audience: Url,
}

impl SessionToken {
    fn from_response(
        resp: TokenResponse,
        audience: Url,
        previous_refresh: Option<SecretString>,
        now: DateTime<Utc>,
    ) -> Self {
        let expires_at = resp
            .expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .map(|secs| now + Duration::seconds(secs));
        Self {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token.or(previous_refresh),
            expires_at,
            audience,
        }
    }

    /// Token stored by a previous run, if complete.
    pub fn from_persisted(state: &PersistedState) -> Option<Self> {
        Some(Self {
            access_token: state.access_token.clone()?,
            refresh_token: state.refresh_token.clone(),
            expires_at: state.token_expires_at,
            audience: state.token_audience.clone()?,
        })
    }

    /// Expired, or expiring within the skew. Tokens without an expiry
    /// are valid until the server rejects them.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|at| at - Duration::seconds(EXPIRY_SKEW_SECS) <= now)
    }

    fn is_for(&self, audience: &Url) -> bool {
        same_audience(&self.audience, audience)
    }
}

fn same_audience(a: &Url, b: &Url) -> bool {
    a.as_str().trim_end_matches('/') == b.as_str().trim_end_matches('/')
}

struct TokenSlot {
    token: Option<SessionToken>,
    /// Bumped on every reset; flows commit only if it is unchanged.
    generation: u64,
}

/// Keeps one cloud session valid.
pub struct SessionManager {
    oauth: OAuthClient,
    authorizer: Option<Arc<dyn Authorizer>>,
    settings: Arc<dyn SettingsStore>,
    slot: Mutex<TokenSlot>,
    flow: tokio::sync::Mutex<()>,
    state: watch::Sender<AuthState>,
    audience_corrected: AtomicBool,
}

impl SessionManager {
    pub fn new(
        oauth: OAuthClient,
        authorizer: Option<Arc<dyn Authorizer>>,
        settings: Arc<dyn SettingsStore>,
        initial: Option<SessionToken>,
    ) -> Self {
        let state = if initial.is_some() {
            AuthState::Ready
        } else {
            AuthState::Unauthenticated
        };
        Self {
            oauth,
            authorizer,
            settings,
            slot: Mutex::new(TokenSlot {
                token: initial,
                generation: 0,
            }),
            flow: tokio::sync::Mutex::new(()),
            state: watch::channel(state).0,
            audience_corrected: AtomicBool::new(false),
        }
    }

    /// Subscribe to authentication state changes.
    pub fn auth_state(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// The installed token, without validating it.
    pub fn current(&self) -> Option<SessionToken> {
        self.lock_slot().token.clone()
    }

    /// Return a token valid for `audience`, refreshing or re-authorizing
    /// as needed.
    ///
    /// A token issued for a different audience is discarded and the flow
    /// restarted with the new one, at most once per session; after that
    /// the token is used as is.
    pub async fn ensure_token(&self, audience: &Url) -> Result<SessionToken, CoreError> {
        let _flow = self.flow.lock().await;
        let generation = self.lock_slot().generation;
        let now = Utc::now();

        let Some(token) = self.current() else {
            return self.authorize_locked(audience, generation).await;
        };

        if !token.is_for(audience) {
            if self.audience_corrected.swap(true, Ordering::SeqCst) {
                warn!(
                    token_audience = %token.audience,
                    %audience,
                    "token audience still differs after one correction; not retrying"
                );
            } else {
                info!(
                    token_audience = %token.audience,
                    %audience,
                    "token audience differs from resolved region; re-authorizing"
                );
                self.discard_token();
                return self.authorize_locked(audience, generation + 1).await;
            }
        }

        if !token.is_expired(now) {
            return Ok(token);
        }

        if let Some(refresh_token) = token.refresh_token.clone() {
            self.set_state(AuthState::Refreshing);
            match self.oauth.refresh(&refresh_token).await {
                Ok(resp) => {
                    debug!("access token refreshed");
                    let refreshed = SessionToken::from_response(
                        resp,
                        token.audience.clone(),
                        Some(refresh_token),
                        Utc::now(),
                    );
                    return self.commit(refreshed, generation);
                }
                Err(e) => warn!(error = %e, "token refresh failed; re-authorizing"),
            }
        } else {
            debug!("access token expired without refresh token; re-authorizing");
        }

        self.authorize_locked(audience, generation).await
    }

    /// Run the full authorization-code flow for `audience`, replacing any
    /// installed token.
    pub async fn authorize(&self, audience: &Url) -> Result<SessionToken, CoreError> {
        let _flow = self.flow.lock().await;
        let generation = self.lock_slot().generation;
        self.authorize_locked(audience, generation).await
    }

    /// Mark the installed access token as expired after the server
    /// rejected it, so the next [`ensure_token`](Self::ensure_token)
    /// refreshes or re-authorizes.
    pub fn expire(&self) {
        if let Some(token) = self.lock_slot().token.as_mut() {
            token.expires_at = Some(DateTime::<Utc>::UNIX_EPOCH);
        }
    }

    /// Forget the token (logout). In-flight flows will not install theirs.
    pub fn clear(&self) {
        self.discard_token();
        self.audience_corrected.store(false, Ordering::SeqCst);
        self.set_state(AuthState::Unauthenticated);
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn authorize_locked(
        &self,
        audience: &Url,
        generation: u64,
    ) -> Result<SessionToken, CoreError> {
        let Some(authorizer) = self.authorizer.as_ref() else {
            self.set_state(AuthState::Unauthenticated);
            return Err(CoreError::AuthorizationRequired);
        };

        self.set_state(AuthState::Authorizing);
        let request = self.oauth.authorization_request(audience);
        let redirect = authorizer
            .authorize(&request.url)
            .await
            .map_err(|e| self.fail(e))?;
        let code = OAuthClient::extract_code(&redirect, &request.state)
            .map_err(|e| self.fail(e.into()))?;

        self.set_state(AuthState::Exchanging);
        let resp = self
            .oauth
            .exchange_code(&code, audience)
            .await
            .map_err(|e| self.fail(e.into()))?;

        info!(%audience, "authorization complete");
        self.commit(
            SessionToken::from_response(resp, audience.clone(), None, Utc::now()),
            generation,
        )
    }

    fn commit(&self, token: SessionToken, generation: u64) -> Result<SessionToken, CoreError> {
        {
            let mut slot = self.lock_slot();
            if slot.generation != generation {
                debug!("session reset during authorization; discarding token");
                drop(slot);
                self.set_state(AuthState::Unauthenticated);
                return Err(CoreError::AuthorizationRequired);
            }
            slot.token = Some(token.clone());
        }
        self.persist(Some(&token));
        self.set_state(AuthState::Ready);
        Ok(token)
    }

    fn discard_token(&self) {
        {
            let mut slot = self.lock_slot();
            slot.generation += 1;
            slot.token = None;
        }
        self.persist(None);
    }

    fn fail(&self, err: CoreError) -> CoreError {
        warn!(error = %err, "authorization failed");
        self.set_state(AuthState::Unauthenticated);
        err
    }

    fn persist(&self, token: Option<&SessionToken>) {
        let result = self.settings.update(&mut |state: &mut PersistedState| match token {
            Some(t) => {
                state.login_mode = LoginMode::Cloud;
                state.access_token = Some(t.access_token.clone());
                state.refresh_token.clone_from(&t.refresh_token);
                state.token_expires_at = t.expires_at;
                state.token_audience = Some(t.audience.clone());
            }
            None => state.clear_tokens(),
        });
        if let Err(e) = result {
            warn!(error = %e, "failed to persist session tokens");
        }
    }

    fn set_state(&self, next: AuthState) {
        self.state.send_if_modified(|state| {
            let changed = *state != next;
            *state = next;
            changed
        });
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, TokenSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use flowdash_api::{OAuthConfig, TransportConfig};
    use secrecy::ExposeSecret;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::persistence::MemorySettings;

    /// Approves every request, echoing the state back.
    #[derive(Default)]
    struct ApprovingAuthorizer {
        calls: AtomicUsize,
        forged_state: bool,
    }

    #[async_trait]
    impl Authorizer for ApprovingAuthorizer {
        async fn authorize(&self, authorize_url: &Url) -> Result<Url, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let state = if self.forged_state {
                "forged".to_owned()
            } else {
                authorize_url
                    .query_pairs()
                    .find(|(k, _)| k == "state")
                    .map(|(_, v)| v.into_owned())
                    .unwrap_or_default()
            };
            Ok(Url::parse(&format!(
                "https://example.com/callback?code=the-code&state={state}"
            ))
            .unwrap())
        }
    }

    fn oauth(server: &MockServer) -> OAuthClient {
        OAuthClient::new(
            OAuthConfig {
                authorize_url: Url::parse("https://auth.example/oauth2/v3/authorize").unwrap(),
                token_url: Url::parse(&format!("{}/oauth2/v3/token", server.uri())).unwrap(),
                client_id: "client".into(),
                client_secret: SecretString::from("secret".to_string()),
                redirect_uri: Url::parse("https://example.com/callback").unwrap(),
                scopes: vec!["openid".into()],
            },
            &TransportConfig::default(),
        )
        .unwrap()
    }

    async fn mount_token(server: &MockServer, grant: &str, status: u16, access: &str) {
        let body = if status == 200 {
            json!({ "access_token": access, "refresh_token": "refresh-new", "expires_in": 3600 })
        } else {
            json!({ "error": "invalid_grant" })
        };
        Mock::given(method("POST"))
            .and(path("/oauth2/v3/token"))
            .and(body_string_contains(format!("grant_type={grant}")))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    fn audience(region: &str) -> Url {
        Url::parse(&format!("https://fleet-api.prd.{region}.vn.cloud.tesla.com")).unwrap()
    }

    fn expired_token(refresh: Option<&str>) -> SessionToken {
        SessionToken {
            access_token: SecretString::from("old".to_string()),
            refresh_token: refresh.map(|r| SecretString::from(r.to_string())),
            expires_at: Some(Utc::now() - Duration::minutes(5)),
            audience: audience("na"),
        }
    }

    fn manager(
        server: &MockServer,
        authorizer: Option<Arc<ApprovingAuthorizer>>,
        initial: Option<SessionToken>,
    ) -> (SessionManager, Arc<MemorySettings>) {
        let settings = Arc::new(MemorySettings::default());
        let authorizer = authorizer.map(|a| a as Arc<dyn Authorizer>);
        let manager = SessionManager::new(oauth(server), authorizer, settings.clone(), initial);
        (manager, settings)
    }

    #[tokio::test]
    async fn authorization_code_flow_reaches_ready_and_persists() {
        let server = MockServer::start().await;
        mount_token(&server, "authorization_code", 200, "fresh").await;
        let authorizer = Arc::new(ApprovingAuthorizer::default());
        let (manager, settings) = manager(&server, Some(authorizer.clone()), None);

        let token = manager.ensure_token(&audience("na")).await.unwrap();

        assert_eq!(token.access_token.expose_secret(), "fresh");
        assert_eq!(*manager.auth_state().borrow(), AuthState::Ready);
        assert_eq!(authorizer.calls.load(Ordering::SeqCst), 1);
        let stored = settings.load().unwrap();
        assert_eq!(
            stored.access_token.map(|t| t.expose_secret().to_owned()),
            Some("fresh".to_owned())
        );
        assert!(stored.token_expires_at.is_some());
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_without_authorizer() {
        let server = MockServer::start().await;
        mount_token(&server, "refresh_token", 200, "refreshed").await;
        let (manager, _) = manager(&server, None, Some(expired_token(Some("refresh-old"))));

        let token = manager.ensure_token(&audience("na")).await.unwrap();
        assert_eq!(token.access_token.expose_secret(), "refreshed");
        assert_eq!(*manager.auth_state().borrow(), AuthState::Ready);
    }

    #[tokio::test]
    async fn refresh_failure_falls_back_to_authorization() {
        let server = MockServer::start().await;
        mount_token(&server, "refresh_token", 401, "").await;
        mount_token(&server, "authorization_code", 200, "reauthorized").await;
        let authorizer = Arc::new(ApprovingAuthorizer::default());
        let (manager, _) = manager(
            &server,
            Some(authorizer.clone()),
            Some(expired_token(Some("refresh-old"))),
        );

        let token = manager.ensure_token(&audience("na")).await.unwrap();
        assert_eq!(token.access_token.expose_secret(), "reauthorized");
        assert_eq!(authorizer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_refresh_token_triggers_authorization() {
        let server = MockServer::start().await;
        mount_token(&server, "authorization_code", 200, "reauthorized").await;
        let authorizer = Arc::new(ApprovingAuthorizer::default());
        let (manager, _) = manager(&server, Some(authorizer.clone()), Some(expired_token(None)));

        manager.ensure_token(&audience("na")).await.unwrap();
        assert_eq!(authorizer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn audience_correction_happens_once() {
        let server = MockServer::start().await;
        mount_token(&server, "authorization_code", 200, "eu-token").await;
        let authorizer = Arc::new(ApprovingAuthorizer::default());
        let valid_na = SessionToken {
            expires_at: Some(Utc::now() + Duration::hours(1)),
            ..expired_token(None)
        };
        let (manager, _) = manager(&server, Some(authorizer.clone()), Some(valid_na));

        let token = manager.ensure_token(&audience("eu")).await.unwrap();
        assert!(token.is_for(&audience("eu")));
        assert_eq!(authorizer.calls.load(Ordering::SeqCst), 1);

        // A second mismatch is not chased again.
        let token = manager.ensure_token(&audience("cn")).await.unwrap();
        assert!(token.is_for(&audience("eu")));
        assert_eq!(authorizer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn without_authorizer_authorization_is_required() {
        let server = MockServer::start().await;
        let (manager, _) = manager(&server, None, None);

        let result = manager.ensure_token(&audience("na")).await;
        assert!(matches!(result, Err(CoreError::AuthorizationRequired)));
        assert_eq!(*manager.auth_state().borrow(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn forged_state_is_rejected() {
        let server = MockServer::start().await;
        let authorizer = Arc::new(ApprovingAuthorizer {
            forged_state: true,
            ..ApprovingAuthorizer::default()
        });
        let (manager, _) = manager(&server, Some(authorizer), None);

        let result = manager.ensure_token(&audience("na")).await;
        assert!(matches!(result, Err(CoreError::AuthenticationFailed { .. })));
        assert_eq!(*manager.auth_state().borrow(), AuthState::Unauthenticated);
        assert!(manager.current().is_none());
    }

    #[tokio::test]
    async fn clear_forgets_token_and_persisted_copy() {
        let server = MockServer::start().await;
        let valid = SessionToken {
            expires_at: None,
            ..expired_token(Some("r"))
        };
        let (manager, settings) = manager(&server, None, Some(valid));
        assert!(!manager.current().unwrap().is_expired(Utc::now()));

        manager.clear();
        assert!(manager.current().is_none());
        assert!(settings.load().unwrap().access_token.is_none());
        assert_eq!(*manager.auth_state().borrow(), AuthState::Unauthenticated);
    }
}
