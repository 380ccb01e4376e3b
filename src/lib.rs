pub mod api;
pub mod config;
pub mod error;
pub mod inflight;
pub mod lifecycle;
pub mod models;
pub mod notice;
pub mod session;
pub mod snapshot;
pub mod surplus;

#[cfg(test)]
mod testing;

pub use error::ClientError;

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::api::{Backend, HttpBackend};
use crate::config::Config;
use crate::lifecycle::RequestLifecycle;
use crate::models::AuthStatus;
use crate::session::{SessionManager, SharedStorage};
use crate::surplus::SurplusCatalog;

/// One tab of the client: a session plus the workflows that run under it.
///
/// Every workflow reaches auth state through the shared [`SessionManager`]
/// rather than a global, so several tabs can live in one process.
pub struct FoodLoop {
    pub session: Arc<SessionManager>,
    pub requests: RequestLifecycle,
    pub surplus: SurplusCatalog,
}

impl FoodLoop {
    pub fn new(storage: SharedStorage, backend: Arc<dyn Backend>) -> Self {
        let session = SessionManager::new(storage, backend);
        Self {
            requests: RequestLifecycle::new(session.clone()),
            surplus: SurplusCatalog::new(session.clone()),
            session,
        }
    }

    /// HTTP backend and file-backed profile storage, as configured
    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        let storage = SharedStorage::open(&config.storage.path)?;
        let backend = HttpBackend::new(&config.api)?;
        Ok(Self::new(storage, Arc::new(backend)))
    }

    /// Another tab on the same storage profile and backend
    pub fn open_tab(&self) -> Self {
        Self::new(
            self.session.storage().clone(),
            self.session.backend().clone(),
        )
    }

    /// Resolve the initial auth state and start following other tabs.
    ///
    /// The returned handle may be dropped; the watcher stops on its own once
    /// this tab is gone.
    pub async fn start(&self) -> (AuthStatus, JoinHandle<()>) {
        let watcher = self.session.watch_changes();
        let status = self.session.check_auth().await;
        info!(
            tab = %self.session.tab_id(),
            authenticated = status.authenticated,
            role = ?status.role(),
            "Session started"
        );
        (status, watcher)
    }
}
