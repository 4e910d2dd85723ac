use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use hintforge_config::{CoordinatorSettings, HintForgeConfig};
use hintforge_core::{
    Envelope, HintError, LabelUniverse, PoolEvent, PoolStore, Reply, TabId, Transport,
};

use crate::coordinator::Coordinator;
use crate::handle::CoordinatorHandle;
use crate::store::{MemoryPoolStore, SqlitePoolStore};

/// Registry of per-tab coordinators.
///
/// A tab's coordinator is spawned on first access and rehydrates its pool
/// from the shared store. Tabs never share state.
pub struct CoordinatorHub {
    universe: LabelUniverse,
    store: Arc<dyn PoolStore>,
    settings: CoordinatorSettings,
    tabs: RwLock<HashMap<TabId, CoordinatorHandle>>,
}

impl CoordinatorHub {
    pub fn new(
        universe: LabelUniverse,
        store: Arc<dyn PoolStore>,
        settings: CoordinatorSettings,
    ) -> Self {
        info!(labels = universe.len(), "Coordinator hub initialized");
        Self {
            universe,
            store,
            settings,
            tabs: RwLock::new(HashMap::new()),
        }
    }

    /// Build a hub from a prepared config: SQLite when a database path is
    /// configured, in-memory storage otherwise.
    pub fn from_config(config: &HintForgeConfig) -> anyhow::Result<Self> {
        let universe = config.label_universe()?;
        let store: Arc<dyn PoolStore> = match config.database_path() {
            Some(path) => Arc::new(SqlitePoolStore::open(path)?),
            None => Arc::new(MemoryPoolStore::new()),
        };
        Ok(Self::new(universe, store, config.coordinator_settings()))
    }

    /// The coordinator of `tab_id`, spawning it if needed.
    pub async fn handle(&self, tab_id: TabId) -> CoordinatorHandle {
        {
            let tabs = self.tabs.read().await;
            if let Some(handle) = tabs.get(&tab_id).filter(|h| h.is_alive()) {
                return handle.clone();
            }
        }

        let mut tabs = self.tabs.write().await;
        if let Some(handle) = tabs.get(&tab_id).filter(|h| h.is_alive()) {
            return handle.clone();
        }
        debug!(tab_id, "Spawning coordinator");
        let handle = Coordinator::spawn(
            tab_id,
            self.universe.clone(),
            self.store.clone(),
            self.settings.clone(),
        );
        tabs.insert(tab_id, handle.clone());
        handle
    }

    /// Route a request to its tab's coordinator.
    pub async fn dispatch(&self, envelope: Envelope) -> Result<Reply, HintError> {
        self.handle(envelope.tab_id).await.send(envelope).await
    }

    /// Tab closed: stop its coordinator and drop its stored pool.
    pub async fn close_tab(&self, tab_id: TabId) {
        let handle = self.tabs.write().await.remove(&tab_id);
        match handle {
            Some(handle) => {
                if let Err(e) = handle.shutdown(true).await {
                    debug!(tab_id, error = %e, "Coordinator already gone");
                }
            }
            None => {
                if let Err(e) = self.store.remove(tab_id).await {
                    warn!(tab_id, error = %e, "Failed to remove stored pool");
                }
            }
        }
        info!(tab_id, "Tab closed");
    }

    /// Stop every coordinator, flushing pending state.
    pub async fn shutdown(&self) {
        let handles: Vec<CoordinatorHandle> =
            self.tabs.write().await.drain().map(|(_, h)| h).collect();
        for handle in handles {
            if let Err(e) = handle.shutdown(false).await {
                debug!(tab_id = handle.tab_id(), error = %e, "Coordinator already gone");
            }
        }
        info!("Coordinator hub shut down");
    }

    /// Tabs with a live coordinator, ascending.
    pub async fn tabs(&self) -> Vec<TabId> {
        let mut tabs: Vec<TabId> = self
            .tabs
            .read()
            .await
            .iter()
            .filter(|(_, h)| h.is_alive())
            .map(|(id, _)| *id)
            .collect();
        tabs.sort_unstable();
        tabs
    }
}

#[async_trait]
impl Transport for CoordinatorHub {
    async fn send(&self, envelope: Envelope) -> Result<Reply, HintError> {
        self.dispatch(envelope).await
    }

    async fn subscribe(&self, tab_id: TabId) -> Option<broadcast::Receiver<PoolEvent>> {
        Some(self.handle(tab_id).await.subscribe())
    }
}
