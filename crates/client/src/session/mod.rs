//! Session management.
//!
//! [`SessionManager`] owns the client-held authentication state: the bearer
//! credential, the user it belongs to, and the transient return URL captured
//! before a login redirect. State transitions are published over a watch
//! channel so other components (the cart synchronizer, a header badge) can
//! react without polling.
//!
//! # State machine
//!
//! - `Anonymous -> Authenticated`: successful [`SessionManager::login`];
//!   credentials are persisted to the [`CredentialStore`].
//! - `Authenticated -> Anonymous`: explicit [`SessionManager::logout`], or
//!   lazily when a validity check finds the stored token expired or
//!   malformed. There is no background timer; expiry is only ever detected
//!   at check time.
//!
//! A process restart replays persisted credentials through the same validity
//! check, so a stale session collapses to `Anonymous` before anything can
//! observe it.

mod store;
pub(crate) mod token;

pub use store::{CredentialStore, FileStore, MemoryStore, keys};
pub use token::{Claims, TokenError, decode_claims};

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiError, IdentityApi, TokenProvider};
use crate::models::{LoginRequest, RegisterRequest, RegisteredUser, Session, User};

/// Route users land on after logout, and the default return URL.
pub const LANDING_ROUTE: &str = "/";

/// Route administrative users land on after login.
pub const DASHBOARD_ROUTE: &str = "/dashboard";

/// The login route, which must never be used as a post-login target.
pub const LOGIN_ROUTE: &str = "/login";

/// Published authentication state.
///
/// Subscribers receive clones and must treat them as immutable snapshots.
#[derive(Debug, Clone, Default)]
pub enum SessionState {
    /// No valid session.
    #[default]
    Anonymous,
    /// A logged-in user with a currently valid credential.
    Authenticated(User),
}

impl SessionState {
    /// The authenticated user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(user) => Some(user),
        }
    }
}

/// Errors surfaced by authentication operations.
///
/// Variants are keyed by what the UI layer needs to tell the user: wrong
/// credentials, service down, or a generic connection problem.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The identity service rejected the credentials (HTTP 401).
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The identity service could not be reached at all.
    #[error("authentication service is unreachable")]
    ServiceUnreachable,

    /// The identity service answered with an unexpected status.
    #[error("authentication failed with status {0}")]
    Connection(u16),

    /// The identity service answered with a body this client cannot read.
    #[error("malformed identity response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Status { status: 401, .. } => Self::InvalidCredentials,
            ApiError::Unreachable(_) => Self::ServiceUnreachable,
            ApiError::Status { status, .. } => Self::Connection(status),
            ApiError::Parse(e) => Self::MalformedResponse(e),
        }
    }
}

/// Post-login redirect policy.
///
/// Administrative users go to the dashboard unless a specific return URL
/// (other than the landing and login routes) was captured before the
/// redirect to login. Shoppers and unrecognized roles always land on the
/// home route - unknown roles fail safe.
#[must_use]
pub fn post_login_target(user: &User, return_url: &str) -> String {
    if user.role.is_admin() {
        if return_url != LANDING_ROUTE && return_url != LOGIN_ROUTE && !return_url.is_empty() {
            return_url.to_owned()
        } else {
            DASHBOARD_ROUTE.to_owned()
        }
    } else {
        LANDING_ROUTE.to_owned()
    }
}

/// Owner of the client-held authentication state.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    api: Arc<dyn IdentityApi>,
    store: Mutex<Box<dyn CredentialStore>>,
    state: watch::Sender<SessionState>,
    return_url: Mutex<String>,
}

impl SessionManager {
    /// Create a session manager and revalidate any persisted credentials.
    ///
    /// A stored token that is malformed or expired is cleared silently and
    /// the manager starts `Anonymous`.
    #[must_use]
    pub fn new(api: Arc<dyn IdentityApi>, store: Box<dyn CredentialStore>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        let manager = Self {
            inner: Arc::new(SessionInner {
                api,
                store: Mutex::new(store),
                state,
                return_url: Mutex::new(LANDING_ROUTE.to_owned()),
            }),
        };
        manager.restore_persisted_session();
        manager
    }

    fn restore_persisted_session(&self) {
        let (stored_token, stored_user) = {
            let store = self.inner.store.lock();
            (store.get(keys::TOKEN), store.get(keys::USER))
        };

        let (Some(_token), Some(user_json)) = (stored_token, stored_user) else {
            return;
        };

        if !self.is_token_valid() {
            // is_token_valid already cleared the stale credentials.
            return;
        }

        match serde_json::from_str::<User>(&user_json) {
            Ok(user) => {
                debug!(user = %user.username, "restored persisted session");
                self.inner.state.send_replace(SessionState::Authenticated(user));
            }
            Err(err) => {
                warn!(error = %err, "persisted user record is corrupt; clearing session");
                self.clear_credentials();
            }
        }
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Authenticate with the identity service.
    ///
    /// Accepts both login response shapes, normalizes them, persists the
    /// credentials, and publishes the new state.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` on HTTP 401,
    /// `AuthError::ServiceUnreachable` when no response arrived at all, and
    /// `AuthError::Connection` for any other status.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let request = LoginRequest {
            email: email.to_owned(),
            password: password.to_owned(),
        };

        let response = self.inner.api.login(&request).await?;
        let session = Session::from_response(response);

        let user_json = serde_json::to_string(&session.user)?;
        {
            let store = self.inner.store.lock();
            store.set(keys::TOKEN, &session.token);
            store.set(keys::USER, &user_json);
        }

        info!(user = %session.user.username, role = %session.user.role, "login succeeded");
        self.inner
            .state
            .send_replace(SessionState::Authenticated(session.user.clone()));

        Ok(session)
    }

    /// Register a new account with the identity service.
    ///
    /// Registration does not log the user in; callers send them to the login
    /// flow afterwards.
    ///
    /// # Errors
    ///
    /// Same mapping as [`SessionManager::login`].
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<RegisteredUser, AuthError> {
        let request = RegisterRequest {
            name: name.to_owned(),
            email: email.to_owned(),
            password: password.to_owned(),
        };
        let registered = self.inner.api.register(&request).await?;
        info!(email = %registered.email, "registration succeeded");
        Ok(registered)
    }

    /// End the session: clear persisted credentials, publish `Anonymous`,
    /// and return the route the caller should navigate to.
    pub fn logout(&self) -> &'static str {
        info!("logging out");
        self.clear_credentials();
        LANDING_ROUTE
    }

    // =========================================================================
    // Validity
    // =========================================================================

    /// The stored bearer credential, valid or not.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.inner.store.lock().get(keys::TOKEN)
    }

    /// Check the stored token against its expiry claim.
    ///
    /// Fails closed: a missing token, wrong segment count, or undecodable
    /// payload all count as invalid, and decode failures clear the persisted
    /// credentials on the spot. A payload without an expiry claim is treated
    /// as valid (see [`Claims::valid_at`]).
    pub fn is_token_valid(&self) -> bool {
        let Some(stored) = self.token() else {
            return false;
        };

        match decode_claims(&stored) {
            Ok(claims) => {
                if claims.exp.is_none() {
                    debug!("token carries no expiry claim; treated as valid");
                    return true;
                }
                let valid = claims.valid_at(Utc::now().timestamp());
                if !valid {
                    warn!("stored token has expired; clearing session");
                    self.clear_credentials();
                }
                valid
            }
            Err(err) => {
                warn!(error = %err, "stored token is malformed; clearing session");
                self.clear_credentials();
                false
            }
        }
    }

    /// True iff a token exists and is currently valid.
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some() && self.is_token_valid()
    }

    /// Log out if the stored token is no longer valid. Returns whether the
    /// session survived the check.
    pub fn ensure_valid(&self) -> bool {
        if self.is_token_valid() {
            true
        } else {
            self.clear_credentials();
            false
        }
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// The last-published user record. Never performs a network call.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.inner.state.borrow().user().cloned()
    }

    /// Subscribe to session state changes.
    ///
    /// The receiver immediately holds the current state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    // =========================================================================
    // Return URL
    // =========================================================================

    /// Capture the route to return to after login.
    pub fn set_return_url(&self, url: &str) {
        *self.inner.return_url.lock() = url.to_owned();
    }

    /// The captured return URL, defaulting to the landing route.
    #[must_use]
    pub fn return_url(&self) -> String {
        self.inner.return_url.lock().clone()
    }

    /// Reset the return URL to the landing route.
    pub fn clear_return_url(&self) {
        *self.inner.return_url.lock() = LANDING_ROUTE.to_owned();
    }

    /// Resolve the post-login redirect for `user`, consuming the captured
    /// return URL.
    #[must_use]
    pub fn take_login_redirect(&self, user: &User) -> String {
        let target = post_login_target(user, &self.return_url());
        self.clear_return_url();
        target
    }

    fn clear_credentials(&self) {
        {
            let store = self.inner.store.lock();
            store.remove(keys::TOKEN);
            store.remove(keys::USER);
        }
        self.inner.state.send_replace(SessionState::Anonymous);
    }
}

impl TokenProvider for SessionManager {
    /// Attach the stored token only while it is valid, mirroring the
    /// client-side request interceptor this replaces.
    fn bearer_token(&self) -> Option<String> {
        let stored = self.token()?;
        self.is_token_valid().then_some(stored)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::token::tests::make_token;
    use super::*;

    use async_trait::async_trait;
    use cartside_core::{Email, Role};

    use crate::models::LoginResponse;

    /// Identity API double returning a canned response.
    struct FakeIdentityApi {
        result: Box<dyn Fn() -> Result<LoginResponse, ApiError> + Send + Sync>,
    }

    impl FakeIdentityApi {
        fn ok_flat(token: &str) -> Arc<Self> {
            let token = token.to_owned();
            Arc::new(Self {
                result: Box::new(move || {
                    Ok(LoginResponse::Flat {
                        token: token.clone(),
                        id: None,
                        email: Email::parse("ana.perez@example.com").unwrap(),
                        role: Role::Shopper,
                    })
                }),
            })
        }

        fn failing(status: Option<u16>) -> Arc<Self> {
            Arc::new(Self {
                result: Box::new(move || {
                    Err(status.map_or_else(
                        || ApiError::Unreachable("connection refused".to_owned()),
                        |s| ApiError::Status {
                            status: s,
                            body: String::new(),
                        },
                    ))
                }),
            })
        }
    }

    #[async_trait]
    impl IdentityApi for FakeIdentityApi {
        async fn login(&self, _request: &LoginRequest) -> Result<LoginResponse, ApiError> {
            (self.result)()
        }

        async fn register(&self, request: &RegisterRequest) -> Result<RegisteredUser, ApiError> {
            Ok(RegisteredUser {
                email: request.email.clone(),
                name: request.name.clone(),
            })
        }
    }

    fn future_token() -> String {
        make_token(&serde_json::json!({
            "sub": "ana@example.com",
            "exp": Utc::now().timestamp() + 3600,
        }))
    }

    fn expired_token() -> String {
        make_token(&serde_json::json!({
            "sub": "ana@example.com",
            "exp": Utc::now().timestamp() - 3600,
        }))
    }

    fn manager_with_store(
        api: Arc<FakeIdentityApi>,
        store: Box<dyn CredentialStore>,
    ) -> SessionManager {
        SessionManager::new(api, store)
    }

    #[tokio::test]
    async fn test_login_publishes_and_persists() {
        let token = future_token();
        let manager =
            manager_with_store(FakeIdentityApi::ok_flat(&token), Box::new(MemoryStore::new()));

        let session = manager.login("ana.perez@example.com", "secret").await.unwrap();
        assert_eq!(session.user.name, "ana.perez");
        assert_eq!(session.user.id, "1");

        assert!(manager.is_authenticated());
        assert_eq!(manager.token(), Some(token));
        assert_eq!(
            manager.current_user().unwrap().username,
            "ana.perez@example.com"
        );
    }

    #[tokio::test]
    async fn test_login_error_mapping() {
        let manager = manager_with_store(
            FakeIdentityApi::failing(Some(401)),
            Box::new(MemoryStore::new()),
        );
        assert!(matches!(
            manager.login("a@b.com", "x").await,
            Err(AuthError::InvalidCredentials)
        ));

        let manager = manager_with_store(
            FakeIdentityApi::failing(Some(500)),
            Box::new(MemoryStore::new()),
        );
        assert!(matches!(
            manager.login("a@b.com", "x").await,
            Err(AuthError::Connection(500))
        ));

        let manager =
            manager_with_store(FakeIdentityApi::failing(None), Box::new(MemoryStore::new()));
        assert!(matches!(
            manager.login("a@b.com", "x").await,
            Err(AuthError::ServiceUnreachable)
        ));
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let token = future_token();
        let manager =
            manager_with_store(FakeIdentityApi::ok_flat(&token), Box::new(MemoryStore::new()));
        manager.login("ana.perez@example.com", "secret").await.unwrap();

        assert_eq!(manager.logout(), LANDING_ROUTE);
        assert!(!manager.is_authenticated());
        assert!(manager.token().is_none());
        assert!(manager.current_user().is_none());
    }

    #[test]
    fn test_token_validity_future_and_past() {
        let store = MemoryStore::new();
        store.set(keys::TOKEN, &future_token());
        let manager = manager_with_store(
            FakeIdentityApi::failing(None),
            Box::new(store),
        );
        assert!(manager.is_token_valid());

        let store = MemoryStore::new();
        store.set(keys::TOKEN, &expired_token());
        let manager = manager_with_store(
            FakeIdentityApi::failing(None),
            Box::new(store),
        );
        assert!(!manager.is_token_valid());
        // Expiry collapses the session and clears storage.
        assert!(manager.token().is_none());
    }

    #[test]
    fn test_token_without_expiry_is_valid() {
        let store = MemoryStore::new();
        store.set(
            keys::TOKEN,
            &make_token(&serde_json::json!({ "sub": "ana@example.com" })),
        );
        let manager = manager_with_store(FakeIdentityApi::failing(None), Box::new(store));
        assert!(manager.is_token_valid());
    }

    #[test]
    fn test_malformed_token_clears_storage() {
        let store = MemoryStore::new();
        store.set(keys::TOKEN, "not-a-jwt");
        store.set(keys::USER, "{}");
        let manager = manager_with_store(FakeIdentityApi::failing(None), Box::new(store));

        assert!(!manager.is_token_valid());
        assert!(manager.token().is_none());
        assert!(!manager.is_authenticated());
    }

    #[test]
    fn test_restore_persisted_session() {
        let user = User {
            id: "7".to_owned(),
            username: "ana@example.com".to_owned(),
            email: Some(Email::parse("ana@example.com").unwrap()),
            name: "Ana".to_owned(),
            role: Role::Shopper,
        };
        let store = MemoryStore::new();
        store.set(keys::TOKEN, &future_token());
        store.set(keys::USER, &serde_json::to_string(&user).unwrap());

        let manager = manager_with_store(FakeIdentityApi::failing(None), Box::new(store));
        assert_eq!(manager.current_user().unwrap().id, "7");
    }

    #[test]
    fn test_restore_with_expired_token_starts_anonymous() {
        let store = MemoryStore::new();
        store.set(keys::TOKEN, &expired_token());
        store.set(keys::USER, "{\"id\":\"7\"}");

        let manager = manager_with_store(FakeIdentityApi::failing(None), Box::new(store));
        assert!(manager.current_user().is_none());
        assert!(manager.token().is_none());
    }

    #[test]
    fn test_restore_with_corrupt_user_clears() {
        let store = MemoryStore::new();
        store.set(keys::TOKEN, &future_token());
        store.set(keys::USER, "not json");

        let manager = manager_with_store(FakeIdentityApi::failing(None), Box::new(store));
        assert!(manager.current_user().is_none());
        assert!(manager.token().is_none());
    }

    #[test]
    fn test_return_url_lifecycle() {
        let manager =
            manager_with_store(FakeIdentityApi::failing(None), Box::new(MemoryStore::new()));
        assert_eq!(manager.return_url(), LANDING_ROUTE);

        manager.set_return_url("/inventory/products");
        assert_eq!(manager.return_url(), "/inventory/products");

        manager.clear_return_url();
        assert_eq!(manager.return_url(), LANDING_ROUTE);
    }

    #[test]
    fn test_post_login_target_policy() {
        let admin = User {
            id: "1".to_owned(),
            username: "root@example.com".to_owned(),
            email: Some(Email::parse("root@example.com").unwrap()),
            name: "root".to_owned(),
            role: Role::Admin,
        };
        let shopper = User {
            role: Role::Shopper,
            ..admin.clone()
        };
        let unknown = User {
            role: Role::Other("auditor".to_owned()),
            ..admin.clone()
        };

        assert_eq!(post_login_target(&admin, "/"), DASHBOARD_ROUTE);
        assert_eq!(post_login_target(&admin, "/login"), DASHBOARD_ROUTE);
        assert_eq!(post_login_target(&admin, "/reports"), "/reports");
        assert_eq!(post_login_target(&shopper, "/reports"), LANDING_ROUTE);
        assert_eq!(post_login_target(&unknown, "/reports"), LANDING_ROUTE);
    }

    #[test]
    fn test_take_login_redirect_consumes_return_url() {
        let manager =
            manager_with_store(FakeIdentityApi::failing(None), Box::new(MemoryStore::new()));
        let admin = User {
            id: "1".to_owned(),
            username: "root@example.com".to_owned(),
            email: None,
            name: "root".to_owned(),
            role: Role::Admin,
        };

        manager.set_return_url("/reports");
        assert_eq!(manager.take_login_redirect(&admin), "/reports");
        assert_eq!(manager.return_url(), LANDING_ROUTE);
    }

    #[test]
    fn test_bearer_token_only_when_valid() {
        let store = MemoryStore::new();
        store.set(keys::TOKEN, &future_token());
        let manager = manager_with_store(FakeIdentityApi::failing(None), Box::new(store));
        assert!(manager.bearer_token().is_some());

        let store = MemoryStore::new();
        store.set(keys::TOKEN, &expired_token());
        let manager = manager_with_store(FakeIdentityApi::failing(None), Box::new(store));
        assert!(manager.bearer_token().is_none());
    }
}
