//! Durable session snapshot. Only `{ accessToken, user }` crosses this
//! boundary; loading and error status are never persisted.

use crate::portal::{session::state::Session, types::User};
use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};
use tracing::debug;

/// Storage key of the persisted session.
pub const SNAPSHOT_KEY: &str = "trueditor-auth";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub access_token: Option<String>,
    pub user: Option<User>,
}

impl SessionSnapshot {
    #[must_use]
    pub fn capture(session: &Session) -> Self {
        Self {
            access_token: session
                .access_token
                .as_ref()
                .map(|token| token.expose_secret().to_string()),
            user: session.user.clone(),
        }
    }
}

/// Key/value persistence for the session snapshot.
pub trait SnapshotStore: Send + Sync {
    /// # Errors
    /// Returns an error if a stored snapshot exists but cannot be read.
    fn load(&self) -> Result<Option<SessionSnapshot>>;

    /// # Errors
    /// Returns an error if the snapshot cannot be written.
    fn save(&self, snapshot: &SessionSnapshot) -> Result<()>;
}

/// Snapshot kept as a JSON file named after [`SNAPSHOT_KEY`].
#[derive(Clone, Debug)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("{SNAPSHOT_KEY}.json")),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Result<Option<SessionSnapshot>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", self.path.display()))
            }
        };

        let snapshot = serde_json::from_str(&raw)
            .with_context(|| format!("decoding {}", self.path.display()))?;

        debug!("session snapshot loaded from {}", self.path.display());

        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let raw = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).with_context(|| format!("writing {}", tmp.display()))?;
        restrict_permissions(&tmp)?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;

        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("setting permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// In-memory snapshot store, used when nothing should touch the disk.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    slot: Mutex<Option<SessionSnapshot>>,
}

impl MemorySnapshotStore {
    #[must_use]
    pub fn with_snapshot(snapshot: SessionSnapshot) -> Self {
        Self {
            slot: Mutex::new(Some(snapshot)),
        }
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<Option<SessionSnapshot>> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        Ok(())
    }
}
