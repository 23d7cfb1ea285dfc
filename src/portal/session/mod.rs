//! ORCID session store. Actions bracket themselves with `is_loading`, record a
//! human-readable `error` on failure and, except for `logout` and the failure
//! path of `refresh_token`, hand the error back to the caller.
//!
//! Flow Overview:
//! 1. `get_login_url` asks the portal for the ORCID authorization URL.
//! 2. ORCID redirects back with a code; `complete_login` trades it for tokens
//!    and the user profile.
//! 3. `initialize` at boot re-validates a persisted token through
//!    `fetch_profile`, which logs out on `401`.
//! 4. `logout` always ends in a clean, logged-out session.
//!
//! Exactly one store should exist per process. Construct it once at boot and
//! pass clones to whoever needs it.

pub mod state;
pub mod storage;

use crate::portal::{
    api::{ApiClient, ClientConfig, TokenProvider},
    errors::ApiError,
    types::{AuthResponse, OrcidCallbackRequest, OrcidLoginResponse, User, UserProfileUpdate},
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

pub use state::{Session, SessionHandle};
pub use storage::{FileSnapshotStore, MemorySnapshotStore, SessionSnapshot, SnapshotStore};

pub const LOGIN_URL_PATH: &str = "/auth/orcid/login/";
pub const CALLBACK_PATH: &str = "/auth/orcid/callback/";
pub const LOGOUT_PATH: &str = "/auth/logout/";
pub const PROFILE_PATH: &str = "/auth/profile/";
pub const SYNC_PATH: &str = "/auth/orcid/sync/";

#[derive(Clone, Debug)]
pub struct SessionStore {
    state: SessionHandle,
    api: ApiClient,
}

impl SessionStore {
    /// Rehydrates the session from `storage` and wires the REST client to it.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig, storage: Arc<dyn SnapshotStore>) -> Result<Self, ApiError> {
        let state = SessionHandle::rehydrate(storage);
        let api = ApiClient::new(config, Arc::new(state.clone()))?;
        Ok(Self { state, api })
    }

    #[must_use]
    pub fn session(&self) -> Session {
        self.state.snapshot()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.read(Session::is_authenticated)
    }

    /// Re-validates a rehydrated token in the background.
    ///
    /// Returns the spawned profile fetch so callers may await it; boot does
    /// not have to.
    pub fn initialize(&self) -> Option<JoinHandle<()>> {
        if self.state.access_token().is_none() {
            debug!("no persisted token, starting logged out");
            return None;
        }

        let store = self.clone();
        Some(tokio::spawn(async move {
            store.fetch_profile().await;
        }))
    }

    /// # Errors
    /// Returns an error if the portal cannot produce an authorization URL.
    #[instrument(skip(self))]
    pub async fn get_login_url(&self) -> Result<String, ApiError> {
        self.begin();
        let result = self
            .api
            .get_data::<OrcidLoginResponse>(LOGIN_URL_PATH)
            .await
            .map(|response| response.authorization_url);
        self.finish(result, "Could not connect to ORCID")
    }

    /// # Errors
    /// Returns an error if the code exchange fails.
    #[instrument(skip(self, code))]
    pub async fn complete_login(&self, code: &str) -> Result<(), ApiError> {
        self.begin();
        let result = self
            .api
            .post_data::<_, AuthResponse>(CALLBACK_PATH, Some(&OrcidCallbackRequest { code }))
            .await
            .map(|auth| {
                info!("logged in as {}", auth.user.orcid_id);
                self.state.update(|session| {
                    session.access_token = Some(SecretString::from(auth.access_token));
                    session.refresh_token = auth.refresh_token.map(SecretString::from);
                    session.user = Some(auth.user);
                });
            });
        self.finish(result, "Login failed")
    }

    /// Ends the session. The server call is best effort; local state is
    /// always cleared.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        self.state.update(|session| session.is_loading = true);

        let body = self
            .state
            .refresh_token()
            .map(|refresh| json!({ "refresh_token": refresh.expose_secret() }));
        if let Err(err) = self.api.post_empty::<Value>(LOGOUT_PATH, body.as_ref()).await {
            debug!("server-side logout failed, clearing locally: {err}");
        }

        self.state.update(|session| {
            session.clear_credentials();
            session.is_loading = false;
        });
        info!("logged out");
    }

    /// Reloads the user. A `401` here means the token is gone for good and
    /// ends the session.
    #[instrument(skip(self))]
    pub async fn fetch_profile(&self) {
        if self.state.access_token().is_none() {
            return;
        }

        self.begin();
        match self.api.get_data::<User>(PROFILE_PATH).await {
            Ok(user) => self.state.update(|session| {
                session.user = Some(user);
                session.is_loading = false;
            }),
            Err(err) => {
                warn!("profile fetch failed: {err}");
                let unauthorized = err.is_unauthorized();
                self.fail(&err, "Could not load profile");
                if unauthorized {
                    self.logout().await;
                }
            }
        }
    }

    /// # Errors
    /// Returns an error if the portal rejects the update.
    #[instrument(skip(self, patch))]
    pub async fn update_profile(&self, patch: &UserProfileUpdate) -> Result<(), ApiError> {
        self.begin();
        let result = self
            .api
            .patch_data::<_, User>(PROFILE_PATH, patch)
            .await
            .map(|user| self.state.update(|session| session.user = Some(user)));
        self.finish(result, "Could not update profile")
    }

    /// Swaps in a fresh access token. Any failure logs out and yields `false`.
    #[instrument(skip(self))]
    pub async fn refresh_token(&self) -> bool {
        self.begin();
        match self.api.refresh_access_token().await {
            Ok(access) => {
                self.state.update(|session| {
                    session.access_token = Some(access);
                    session.is_loading = false;
                });
                debug!("access token refreshed");
                true
            }
            Err(err) => {
                warn!("token refresh failed, logging out: {err}");
                self.logout().await;
                false
            }
        }
    }

    /// Pulls the latest identity data from ORCID into the portal profile.
    ///
    /// # Errors
    /// Returns an error if the sync request fails.
    #[instrument(skip(self))]
    pub async fn sync_profile(&self) -> Result<(), ApiError> {
        self.begin();
        let result = self
            .api
            .post_data::<Value, User>(SYNC_PATH, None)
            .await
            .map(|user| self.state.update(|session| session.user = Some(user)));
        self.finish(result, "Synchronization failed")
    }

    fn begin(&self) {
        self.state.update(|session| {
            session.is_loading = true;
            session.error = None;
        });
    }

    fn fail(&self, err: &ApiError, fallback: &str) {
        let message = err.server_message().unwrap_or(fallback).to_string();
        self.state.update(|session| {
            session.error = Some(message);
            session.is_loading = false;
        });
    }

    fn finish<T>(&self, result: Result<T, ApiError>, fallback: &str) -> Result<T, ApiError> {
        match &result {
            Ok(_) => self.state.update(|session| session.is_loading = false),
            Err(err) => self.fail(err, fallback),
        }
        result
    }
}
