use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use hintforge_config::CoordinatorSettings;
use hintforge_core::{
    ActivityReport, Envelope, FrameId, Label, LabelPool, LabelUniverse, Operation, PoolEvent,
    PoolStore, Reply, TabId, MAIN_FRAME,
};

use crate::handle::{CoordinatorHandle, PoolSnapshot};

/// Messages consumed by a coordinator task.
pub(crate) enum Command {
    Request {
        envelope: Envelope,
        reply: oneshot::Sender<Reply>,
    },
    Snapshot {
        reply: oneshot::Sender<PoolSnapshot>,
    },
    Shutdown {
        discard: bool,
        done: oneshot::Sender<()>,
    },
}

/// Sole owner of one tab's label pool.
///
/// Requests are processed one at a time by [`Coordinator::run`], so every
/// operation is atomic with respect to every other one on the same tab.
pub struct Coordinator {
    tab_id: TabId,
    pool: LabelPool,
    reports: BTreeMap<FrameId, ActivityReport>,
    store: Arc<dyn PoolStore>,
    events: broadcast::Sender<PoolEvent>,
    settings: CoordinatorSettings,
}

impl Coordinator {
    /// Start a coordinator task for `tab_id` and return its handle. The pool
    /// is rehydrated from `store` before the first request is served.
    pub fn spawn(
        tab_id: TabId,
        universe: LabelUniverse,
        store: Arc<dyn PoolStore>,
        settings: CoordinatorSettings,
    ) -> CoordinatorHandle {
        let (tx, rx) = mpsc::channel(settings.channel_buffer);
        let (events, _) = broadcast::channel(settings.event_buffer);
        let handle = CoordinatorHandle::new(tab_id, tx, events.clone());

        tokio::spawn(async move {
            let coordinator = Coordinator::rehydrate(tab_id, universe, store, events, settings).await;
            coordinator.run(rx).await;
        });

        handle
    }

    /// Restore the tab's pool from storage, or start fresh when nothing
    /// usable is stored.
    pub async fn rehydrate(
        tab_id: TabId,
        universe: LabelUniverse,
        store: Arc<dyn PoolStore>,
        events: broadcast::Sender<PoolEvent>,
        settings: CoordinatorSettings,
    ) -> Self {
        let pool = match store.load(tab_id).await {
            Ok(Some(persisted)) => match LabelPool::from_persisted(universe.clone(), persisted) {
                Ok(pool) => {
                    info!(
                        tab_id,
                        free = pool.free_len(),
                        assigned = pool.assigned_len(),
                        "Pool rehydrated"
                    );
                    pool
                }
                Err(e) => {
                    warn!(tab_id, error = %e, "Stored pool unusable, starting fresh");
                    LabelPool::new(universe)
                }
            },
            Ok(None) => {
                debug!(tab_id, "No stored pool, starting fresh");
                LabelPool::new(universe)
            }
            Err(e) => {
                warn!(tab_id, error = %e, "Failed to load pool, starting fresh");
                LabelPool::new(universe)
            }
        };

        Self {
            tab_id,
            pool,
            reports: BTreeMap::new(),
            store,
            events,
            settings,
        }
    }

    /// Serve requests until every sender is gone or a shutdown arrives.
    /// Mutations are persisted after a debounce period.
    pub(crate) async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        info!(tab_id = self.tab_id, "Coordinator started");

        let mut flush_at: Option<Instant> = None;
        let mut dirty_since: Option<Instant> = None;

        loop {
            let deadline = flush_at.unwrap_or_else(Instant::now);
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(Command::Request { envelope, reply }) => {
                        let operation = envelope.operation.name();
                        let (answer, changed) = self.handle(envelope);
                        if reply.send(answer).is_err() {
                            debug!(tab_id = self.tab_id, operation, "Requester gone before reply");
                        }
                        if changed {
                            let now = Instant::now();
                            let first = *dirty_since.get_or_insert(now);
                            flush_at = Some(
                                (now + self.settings.persist_debounce)
                                    .min(first + self.settings.persist_max_delay),
                            );
                        }
                    }
                    Some(Command::Snapshot { reply }) => {
                        let _ = reply.send(PoolSnapshot::of(&self.pool));
                    }
                    Some(Command::Shutdown { discard, done }) => {
                        if discard {
                            if let Err(e) = self.store.remove(self.tab_id).await {
                                error!(tab_id = self.tab_id, error = %e, "Failed to remove stored pool");
                            }
                        } else if flush_at.is_some() {
                            self.persist().await;
                        }
                        let _ = done.send(());
                        info!(tab_id = self.tab_id, discard, "Coordinator stopped");
                        return;
                    }
                    None => break,
                },
                _ = time::sleep_until(deadline), if flush_at.is_some() => {
                    self.persist().await;
                    flush_at = None;
                    dirty_since = None;
                }
            }
        }

        if flush_at.is_some() {
            self.persist().await;
        }
        info!(tab_id = self.tab_id, "Coordinator channel closed, shutting down");
    }

    /// Apply one request. Returns the reply and whether the pool changed.
    pub fn handle(&mut self, envelope: Envelope) -> (Reply, bool) {
        let frame = envelope.frame_id;
        match envelope.operation {
            Operation::Init => (Reply::Empty, self.init(frame)),
            Operation::Claim { amount } => {
                let claimed = self.claim(frame, amount);
                let changed = !claimed.is_empty();
                (Reply::Labels(claimed), changed)
            }
            Operation::Release { hints } => {
                let changed = !self.release(frame, &hints).is_empty();
                (Reply::Empty, changed)
            }
            Operation::ReclaimOrphans { active } => {
                let active: HashSet<Label> = active.into_iter().collect();
                let freed = self.reclaim_orphans(frame, &active);
                let changed = !freed.is_empty();
                (Reply::Labels(freed), changed)
            }
            Operation::ReclaimFromOtherFrames { amount } => {
                let taken = self.reclaim_from_other_frames(frame, amount);
                let changed = !taken.is_empty();
                (Reply::Labels(taken), changed)
            }
            Operation::Synchronize { report } => {
                let (stale, changed) = self.synchronize(frame, report);
                (Reply::Labels(stale), changed)
            }
        }
    }

    /// Reset the pool. Only the main frame may do this; from any other frame
    /// it is a no-op.
    pub fn init(&mut self, frame: FrameId) -> bool {
        if frame != MAIN_FRAME {
            debug!(tab_id = self.tab_id, frame_id = frame, "Ignoring init from sub-frame");
            return false;
        }
        self.pool.reset();
        self.reports.clear();
        let _ = self.events.send(PoolEvent::Reset);
        info!(tab_id = self.tab_id, labels = self.pool.free_len(), "Pool initialized");
        true
    }

    pub fn claim(&mut self, frame: FrameId, amount: usize) -> Vec<Label> {
        let claimed = self.pool.claim(frame, amount);
        debug!(
            tab_id = self.tab_id,
            frame_id = frame,
            requested = amount,
            granted = claimed.len(),
            "Labels claimed"
        );
        claimed
    }

    /// Free the sender's labels. Labels it no longer owns are left alone.
    pub fn release(&mut self, frame: FrameId, hints: &[Label]) -> Vec<Label> {
        let freed = self.pool.release(frame, hints);
        if freed.len() < hints.len() {
            debug!(
                tab_id = self.tab_id,
                frame_id = frame,
                requested = hints.len(),
                freed = freed.len(),
                "Ignored release of labels not owned by the sender"
            );
        }
        freed
    }

    /// Free labels assigned to `frame` that it no longer reports.
    pub fn reclaim_orphans(&mut self, frame: FrameId, active: &HashSet<Label>) -> Vec<Label> {
        let freed = self.pool.reclaim_orphans(frame, active);
        if !freed.is_empty() {
            info!(
                tab_id = self.tab_id,
                frame_id = frame,
                count = freed.len(),
                "Reclaimed orphaned labels"
            );
        }
        freed
    }

    /// Hand idle labels of other frames to `requester`.
    ///
    /// Frames are visited in ascending id order and the first reclaimable
    /// labels found are taken.
    pub fn reclaim_from_other_frames(&mut self, requester: FrameId, amount: usize) -> Vec<Label> {
        let mut taken = Vec::new();
        let mut revoked: Vec<(FrameId, Vec<Label>)> = Vec::new();

        for (frame, report) in self.reports.iter_mut() {
            if taken.len() >= amount {
                break;
            }
            if *frame == requester {
                continue;
            }
            let candidates: Vec<Label> = report
                .idle
                .iter()
                .filter(|label| self.pool.owner(label) == Some(*frame))
                .take(amount - taken.len())
                .cloned()
                .collect();
            if candidates.is_empty() {
                continue;
            }
            for label in &candidates {
                self.pool.reassign(label, requester);
                report.forget(label);
            }
            taken.extend(candidates.iter().cloned());
            revoked.push((*frame, candidates));
        }

        for (frame_id, labels) in revoked {
            debug!(
                tab_id = self.tab_id,
                from = frame_id,
                to = requester,
                count = labels.len(),
                "Labels reassigned between frames"
            );
            let _ = self.events.send(PoolEvent::Revoked { frame_id, labels });
        }
        taken
    }

    /// Reconcile a frame's report with the pool.
    ///
    /// Orphans are freed and the report is kept for later reclaiming.
    /// Returns the labels the frame reported but does not own, and whether
    /// the pool changed.
    pub fn synchronize(&mut self, frame: FrameId, mut report: ActivityReport) -> (Vec<Label>, bool) {
        let active = report.active_set();
        let freed = self.reclaim_orphans(frame, &active);

        let mut stale: Vec<Label> = active
            .into_iter()
            .filter(|label| self.pool.owner(label) != Some(frame))
            .collect();
        stale.sort();
        for label in &stale {
            report.forget(label);
        }
        if !stale.is_empty() {
            debug!(
                tab_id = self.tab_id,
                frame_id = frame,
                count = stale.len(),
                "Frame reported labels it does not own"
            );
        }

        if report.is_empty() {
            self.reports.remove(&frame);
        } else {
            self.reports.insert(frame, report);
        }
        (stale, !freed.is_empty())
    }

    pub fn pool(&self) -> &LabelPool {
        &self.pool
    }

    async fn persist(&self) {
        match self.store.save(self.tab_id, &self.pool.to_persisted()).await {
            Ok(()) => debug!(tab_id = self.tab_id, "Pool persisted"),
            Err(e) => error!(tab_id = self.tab_id, error = %e, "Failed to persist pool"),
        }
    }
}
