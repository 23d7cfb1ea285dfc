use crate::portal::{api::ClientConfig, session::FileSnapshotStore};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub api_base_url: String,
    pub timeout: Duration,
    pub state_dir: PathBuf,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(api_base_url: String, state_dir: PathBuf) -> Self {
        Self {
            api_base_url,
            timeout: crate::portal::api::DEFAULT_TIMEOUT,
            state_dir,
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api_base_url.clone(),
            timeout: self.timeout,
        }
    }

    #[must_use]
    pub fn snapshot_store(&self) -> FileSnapshotStore {
        FileSnapshotStore::in_dir(&self.state_dir)
    }
}
