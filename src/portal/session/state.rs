//! In-memory session state and the shared handle through which it is read and
//! mutated. Every mutation writes the persisted snapshot; token material stays
//! inside `SecretString` and is never logged.

use crate::portal::{
    api::TokenProvider,
    session::storage::{SessionSnapshot, SnapshotStore},
    types::User,
};
use secrecy::SecretString;
use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
};
use tracing::warn;

const ORCID_BASE_URL: &str = "https://orcid.org";

#[derive(Clone, Default)]
pub struct Session {
    pub user: Option<User>,
    pub access_token: Option<SecretString>,
    /// Held in memory only; never part of the persisted snapshot.
    pub refresh_token: Option<SecretString>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl fmt::Debug for Session {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Session")
            .field("user", &self.user.as_ref().map(|user| &user.orcid_id))
            .field("has_access_token", &self.access_token.is_some())
            .field("is_loading", &self.is_loading)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Rebuilds a session from a persisted snapshot.
    #[must_use]
    pub fn restore(snapshot: SessionSnapshot) -> Self {
        Self {
            user: snapshot.user,
            access_token: snapshot.access_token.map(SecretString::from),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some() && self.user.is_some()
    }

    #[must_use]
    pub fn profile_completed(&self) -> bool {
        self.user.as_ref().is_some_and(|user| user.profile_completed)
    }

    /// Full name, falling back to the ORCID iD.
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.user {
            Some(user) if !user.full_name.is_empty() => user.full_name.clone(),
            Some(user) => user.orcid_id.clone(),
            None => String::new(),
        }
    }

    #[must_use]
    pub fn orcid_id(&self) -> String {
        self.user
            .as_ref()
            .map(|user| user.orcid_id.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn orcid_url(&self) -> String {
        self.user
            .as_ref()
            .map(|user| format!("{ORCID_BASE_URL}/{}", user.orcid_id))
            .unwrap_or_default()
    }

    /// Drops identity and tokens. Status flags are left to the caller.
    pub fn clear_credentials(&mut self) {
        self.user = None;
        self.access_token = None;
        self.refresh_token = None;
    }
}

/// Shared, persisted session state.
///
/// One handle (and its clones) per process: the REST client reads tokens from
/// it and the session store mutates it.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<RwLock<Session>>,
    storage: Arc<dyn SnapshotStore>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SessionHandle")
            .field("session", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    /// Reads the persisted snapshot once and rehydrates the session from it.
    /// An unreadable snapshot starts an empty session.
    pub fn rehydrate(storage: Arc<dyn SnapshotStore>) -> Self {
        let session = match storage.load() {
            Ok(Some(snapshot)) => Session::restore(snapshot),
            Ok(None) => Session::default(),
            Err(err) => {
                warn!("ignoring unreadable session snapshot: {err:#}");
                Session::default()
            }
        };

        Self {
            inner: Arc::new(RwLock::new(session)),
            storage,
        }
    }

    /// Copy of the current session.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reads the session without cloning it.
    pub fn read<R>(&self, reader: impl FnOnce(&Session) -> R) -> R {
        reader(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Mutates the session and writes the persisted snapshot.
    ///
    /// The write lock is held until the snapshot is saved, so storage sees
    /// snapshots in the same order as the mutations that produced them.
    pub fn update<R>(&self, mutate: impl FnOnce(&mut Session) -> R) -> R {
        let mut session = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let result = mutate(&mut session);

        if let Err(err) = self.storage.save(&SessionSnapshot::capture(&session)) {
            warn!("failed to persist session snapshot: {err:#}");
        }

        result
    }
}

impl TokenProvider for SessionHandle {
    fn access_token(&self) -> Option<SecretString> {
        self.read(|session| session.access_token.clone())
    }

    fn refresh_token(&self) -> Option<SecretString> {
        self.read(|session| session.refresh_token.clone())
    }

    fn token_refreshed(&self, access: SecretString) {
        self.update(|session| session.access_token = Some(access));
    }

    fn refresh_failed(&self) {
        self.update(Session::clear_credentials);
    }
}
