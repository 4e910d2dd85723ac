use std::collections::BTreeMap;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot};

use hintforge_core::{
    ActivityReport, Envelope, FrameId, HintError, Label, LabelPool, Operation, PoolEvent, Reply,
    TabId, Transport,
};

use crate::coordinator::Command;

/// Point-in-time copy of a pool, for inspection and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub free: Vec<Label>,
    pub assigned: BTreeMap<Label, FrameId>,
}

impl PoolSnapshot {
    pub(crate) fn of(pool: &LabelPool) -> Self {
        let assigned = pool
            .frames()
            .into_iter()
            .flat_map(|frame| {
                pool.assigned_to(frame)
                    .into_iter()
                    .map(move |label| (label, frame))
            })
            .collect();
        Self {
            free: pool.free().to_vec(),
            assigned,
        }
    }
}

/// Cloneable sender side of one tab's coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tab_id: TabId,
    tx: mpsc::Sender<Command>,
    events: broadcast::Sender<PoolEvent>,
}

impl CoordinatorHandle {
    pub(crate) fn new(
        tab_id: TabId,
        tx: mpsc::Sender<Command>,
        events: broadcast::Sender<PoolEvent>,
    ) -> Self {
        Self { tab_id, tx, events }
    }

    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }

    /// Whether the coordinator task is still accepting requests.
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Send a request and wait for the reply.
    pub async fn request(&self, frame_id: FrameId, operation: Operation) -> Result<Reply, HintError> {
        self.send_envelope(Envelope::new(self.tab_id, frame_id, operation))
            .await
    }

    async fn send_envelope(&self, envelope: Envelope) -> Result<Reply, HintError> {
        if envelope.tab_id != self.tab_id {
            return Err(HintError::Other(anyhow!(
                "request for tab {} sent to coordinator of tab {}",
                envelope.tab_id,
                self.tab_id
            )));
        }
        let operation = envelope.operation.name();
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Request { envelope, reply })
            .await
            .map_err(|_| HintError::ChannelClosed(format!("tab {} ({operation})", self.tab_id)))?;
        rx.await
            .map_err(|_| HintError::ChannelClosed(format!("tab {} ({operation}) reply", self.tab_id)))
    }

    pub async fn init(&self, frame_id: FrameId) -> Result<(), HintError> {
        self.request(frame_id, Operation::Init).await.map(|_| ())
    }

    pub async fn claim(&self, frame_id: FrameId, amount: usize) -> Result<Vec<Label>, HintError> {
        self.request(frame_id, Operation::Claim { amount })
            .await
            .map(Reply::into_labels)
    }

    pub async fn release(&self, frame_id: FrameId, hints: Vec<Label>) -> Result<(), HintError> {
        self.request(frame_id, Operation::Release { hints })
            .await
            .map(|_| ())
    }

    pub async fn reclaim_orphans(
        &self,
        frame_id: FrameId,
        active: Vec<Label>,
    ) -> Result<Vec<Label>, HintError> {
        self.request(frame_id, Operation::ReclaimOrphans { active })
            .await
            .map(Reply::into_labels)
    }

    pub async fn reclaim_from_other_frames(
        &self,
        frame_id: FrameId,
        amount: usize,
    ) -> Result<Vec<Label>, HintError> {
        self.request(frame_id, Operation::ReclaimFromOtherFrames { amount })
            .await
            .map(Reply::into_labels)
    }

    pub async fn synchronize(
        &self,
        frame_id: FrameId,
        report: ActivityReport,
    ) -> Result<Vec<Label>, HintError> {
        self.request(frame_id, Operation::Synchronize { report })
            .await
            .map(Reply::into_labels)
    }

    pub async fn snapshot(&self) -> Result<PoolSnapshot, HintError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| HintError::ChannelClosed(format!("tab {} (snapshot)", self.tab_id)))?;
        rx.await
            .map_err(|_| HintError::ChannelClosed(format!("tab {} (snapshot) reply", self.tab_id)))
    }

    /// Stop the coordinator. With `discard` the stored pool is deleted,
    /// otherwise pending state is flushed first.
    pub async fn shutdown(&self, discard: bool) -> Result<(), HintError> {
        let (done, rx) = oneshot::channel();
        self.tx
            .send(Command::Shutdown { discard, done })
            .await
            .map_err(|_| HintError::ChannelClosed(format!("tab {} (shutdown)", self.tab_id)))?;
        rx.await
            .map_err(|_| HintError::ChannelClosed(format!("tab {} (shutdown) reply", self.tab_id)))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl Transport for CoordinatorHandle {
    async fn send(&self, envelope: Envelope) -> Result<Reply, HintError> {
        self.send_envelope(envelope).await
    }

    async fn subscribe(&self, tab_id: TabId) -> Option<broadcast::Receiver<PoolEvent>> {
        (tab_id == self.tab_id).then(|| self.events.subscribe())
    }
}
