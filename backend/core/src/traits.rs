use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::HintError;
use crate::event::PoolEvent;
use crate::message::{Envelope, Reply};
use crate::types::TabId;
use crate::wire::PersistedPool;

/// The channel a frame uses to reach its tab's coordinator.
///
/// Delivery is at-most-once. A closed channel surfaces as
/// [`HintError::ChannelClosed`] and is never retried.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a request and wait for the coordinator's reply.
    async fn send(&self, envelope: Envelope) -> Result<Reply, HintError>;

    /// Subscribe to pool events of a tab, if the tab is reachable.
    async fn subscribe(&self, tab_id: TabId) -> Option<broadcast::Receiver<PoolEvent>>;
}

/// Durable storage for pool state, keyed by tab.
#[async_trait]
pub trait PoolStore: Send + Sync {
    /// Load a tab's pool; `None` when nothing was stored.
    async fn load(&self, tab_id: TabId) -> Result<Option<PersistedPool>, HintError>;

    /// Overwrite a tab's stored pool.
    async fn save(&self, tab_id: TabId, pool: &PersistedPool) -> Result<(), HintError>;

    /// Drop a tab's stored pool.
    async fn remove(&self, tab_id: TabId) -> Result<(), HintError>;
}
