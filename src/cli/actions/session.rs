use crate::{
    cli::{actions::Action, globals::GlobalArgs},
    portal::session::SessionStore,
};
use anyhow::{anyhow, bail, Result};
use std::sync::Arc;
use tracing::debug;

/// Builds the process-wide session store from the persisted snapshot.
///
/// # Errors
/// Returns an error if the HTTP client cannot be built.
pub fn boot(globals: &GlobalArgs) -> Result<SessionStore> {
    let storage = globals.snapshot_store();
    debug!("session snapshot at {}", storage.path().display());
    Ok(SessionStore::new(&globals.client_config(), Arc::new(storage))?)
}

/// Rehydrates and, when a token was persisted, re-validates it before use.
pub(crate) async fn boot_verified(globals: &GlobalArgs) -> Result<SessionStore> {
    let store = boot(globals)?;
    if let Some(handle) = store.initialize() {
        handle.await?;
    }
    Ok(store)
}

/// Handle the session actions
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::LoginUrl => {
            let store = boot(globals)?;
            println!("{}", store.get_login_url().await?);
        }

        Action::Login { code } => {
            let store = boot(globals)?;
            store.complete_login(&code).await?;
            let session = store.session();
            println!("Logged in as {} ({})", session.full_name(), session.orcid_url());
            if !session.profile_completed() {
                println!("Profile incomplete, run `trueditor update-profile` to finish it");
            }
        }

        Action::Logout => {
            let store = boot(globals)?;
            store.logout().await;
            println!("Logged out");
        }

        Action::Profile => {
            let store = boot_verified(globals).await?;
            let session = store.session();
            let Some(user) = session.user else {
                bail!(session
                    .error
                    .unwrap_or_else(|| "Not logged in".to_string()));
            };
            println!("{}", serde_json::to_string_pretty(&user)?);
        }

        Action::UpdateProfile { patch } => {
            let store = boot(globals)?;
            require_login(&store)?;
            store.update_profile(&patch).await?;
            println!("Profile updated");
        }

        Action::Sync => {
            let store = boot(globals)?;
            require_login(&store)?;
            store.sync_profile().await?;
            println!("Profile synchronized with ORCID");
        }

        Action::Refresh => {
            let store = boot(globals)?;
            require_login(&store)?;
            if !store.refresh_token().await {
                bail!("Token refresh failed, logged out");
            }
            println!("Access token refreshed");
        }

        Action::Navigate { .. } | Action::Routes => {
            return Err(anyhow!("not a session action: {action:?}"));
        }
    }

    Ok(())
}

fn require_login(store: &SessionStore) -> Result<()> {
    if store.session().access_token.is_none() {
        bail!("Not logged in, run `trueditor login-url` first");
    }
    Ok(())
}
