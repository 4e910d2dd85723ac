use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use hintforge_config::ClientSettings;
use hintforge_core::{
    ActivityReport, Envelope, FrameId, HintError, Label, Operation, PoolEvent, Reply, TabId,
    Transport, MAIN_FRAME,
};

use crate::cache::FrameCache;
use crate::tracker::HintTracker;

/// Everything a frame knows about its labels. Advisory: the coordinator's
/// pool is the only source of truth.
#[derive(Debug, Default)]
struct FrameState {
    cache: FrameCache,
    /// Labels this frame believes are assigned to it.
    owned: HashSet<Label>,
    /// Owned labels handed out and not yet reported out of view.
    rendered: HashSet<Label>,
    /// Owned labels left on out-of-view elements and offered to other
    /// frames. Never handed out again by this frame.
    given_up: HashSet<Label>,
}

impl FrameState {
    fn clear(&mut self) {
        self.cache.clear();
        self.owned.clear();
        self.rendered.clear();
        self.given_up.clear();
    }

    fn drop_labels(&mut self, labels: &[Label]) {
        for label in labels {
            self.owned.remove(label);
            self.rendered.remove(label);
            self.given_up.remove(label);
            self.cache.remove(label);
        }
    }

    /// Mark labels as handed out to elements.
    fn hand_out(&mut self, labels: &[Label]) {
        self.rendered.extend(labels.iter().cloned());
    }

    /// Build the report for a synchronize. Labels that are neither shown
    /// nor cached are given up from here on.
    fn report(&mut self) -> ActivityReport {
        let mut held: HashSet<Label> = self.cache.labels().into_iter().collect();
        held.extend(self.rendered.iter().cloned());
        self.given_up = self.owned.difference(&held).cloned().collect();

        let mut held: Vec<Label> = held.into_iter().collect();
        let mut idle: Vec<Label> = self.given_up.iter().cloned().collect();
        held.sort();
        idle.sort();
        ActivityReport::new(held, idle)
    }
}

/// Cache sizes of a frame client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub primary: usize,
    pub secondary: usize,
    pub pending: usize,
    pub owned: usize,
}

/// Per-frame label client.
///
/// Serves per-element requests from a local two-tier cache and talks to the
/// tab's coordinator in batches. A frame-local mutex serializes this frame's
/// own concurrent callers; frames never share state.
pub struct FrameClient {
    tab_id: TabId,
    frame_id: FrameId,
    transport: Arc<dyn Transport>,
    tracker: Arc<dyn HintTracker>,
    settings: ClientSettings,
    state: Mutex<FrameState>,
    detached: AtomicBool,
}

impl FrameClient {
    pub fn new(
        tab_id: TabId,
        frame_id: FrameId,
        transport: Arc<dyn Transport>,
        tracker: Arc<dyn HintTracker>,
        settings: ClientSettings,
    ) -> Self {
        debug!(tab_id, frame_id, "Frame client created");
        Self {
            tab_id,
            frame_id,
            transport,
            tracker,
            settings,
            state: Mutex::new(FrameState::default()),
            detached: AtomicBool::new(false),
        }
    }

    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn is_main_frame(&self) -> bool {
        self.frame_id == MAIN_FRAME
    }

    /// True once the coordinator channel was found closed.
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Relaxed)
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Claim `amount` labels straight from the coordinator.
    pub async fn claim_hints(&self, amount: usize) -> Vec<Label> {
        let mut state = self.state.lock().await;
        let labels = self.claim_locked(&mut state, amount).await;
        state.hand_out(&labels);
        labels
    }

    /// Size the cache for `necessary` labels needed now plus `additional`
    /// likely needed soon. Shortfalls are claimed in one request; surplus is
    /// queued for a batched release.
    pub async fn cache_hints(&self, necessary: usize, additional: usize) {
        let mut state = self.state.lock().await;
        state.cache.absorb_pending();

        let total = necessary + additional;
        let held = state.cache.cached_len();
        if held < total {
            let fresh = self.claim_locked(&mut state, total - held).await;
            state.cache.extend(fresh);
        } else if held > total {
            let moved = state.cache.trim_to(total);
            debug!(frame_id = self.frame_id, count = moved, "Surplus labels queued for return");
        }
        state.cache.rebalance(necessary);

        if state.cache.pending_len() >= self.settings.return_batch_size {
            self.flush_returns_locked(&mut state).await;
        }
    }

    /// Next label for an element.
    ///
    /// Falls back, in order, to pending returns, labels on this frame's
    /// out-of-view elements, and idle labels of other frames.
    pub async fn pop_hint(&self) -> Option<Label> {
        let mut state = self.state.lock().await;
        let label = self.pop_locked(&mut state).await;
        if let Some(label) = &label {
            state.hand_out(std::slice::from_ref(label));
        }
        label
    }

    async fn pop_locked(&self, state: &mut FrameState) -> Option<Label> {
        if let Some(label) = state.cache.take() {
            return Some(label);
        }
        if let Some(label) = state.cache.take_pending() {
            return Some(label);
        }

        let mut found = None;
        for label in self.tracker.reclaim_out_of_view(1) {
            if !state.owned.contains(&label) || state.given_up.contains(&label) {
                debug!(frame_id = self.frame_id, label = %label, "Tracker returned a label this frame cannot reuse");
                continue;
            }
            state.rendered.remove(&label);
            if found.is_none() {
                found = Some(label);
            } else {
                state.cache.put_back(label);
            }
        }
        if found.is_some() {
            return found;
        }

        let taken = self
            .call(Operation::ReclaimFromOtherFrames { amount: 1 })
            .await
            .map(Reply::into_labels)
            .unwrap_or_default();
        let mut taken = taken.into_iter();
        let first = taken.next();
        if let Some(label) = &first {
            state.owned.insert(label.clone());
        }
        for extra in taken {
            state.owned.insert(extra.clone());
            state.cache.put_back(extra);
        }
        if first.is_none() {
            debug!(frame_id = self.frame_id, "No label available");
        }
        first
    }

    /// Give a label back to the cache for reuse by another element.
    pub async fn push_hint(&self, label: Label) {
        let mut state = self.state.lock().await;
        if !state.owned.contains(&label) || state.given_up.contains(&label) {
            debug!(frame_id = self.frame_id, label = %label, "Ignoring push of label not reusable");
            return;
        }
        state.rendered.remove(&label);
        state.cache.remove(&label);
        state.cache.put_back(label);
    }

    /// Up to `amount` labels, from the cache first, claiming the rest.
    pub async fn request_hints(&self, amount: usize) -> Vec<Label> {
        let mut state = self.state.lock().await;
        let mut labels = Vec::with_capacity(amount);
        while labels.len() < amount {
            match state.cache.take().or_else(|| state.cache.take_pending()) {
                Some(label) => labels.push(label),
                None => break,
            }
        }
        if labels.len() < amount {
            let missing = amount - labels.len();
            labels.extend(self.claim_locked(&mut state, missing).await);
        }
        state.hand_out(&labels);
        labels
    }

    /// Hand a label back to the pool. Releases are batched.
    pub async fn return_hint(&self, label: Label) {
        let mut state = self.state.lock().await;
        if !state.owned.contains(&label) {
            debug!(frame_id = self.frame_id, label = %label, "Ignoring return of label not owned");
            return;
        }
        state.rendered.remove(&label);
        state.given_up.remove(&label);
        state.cache.remove(&label);
        state.cache.queue_return(label);
        if state.cache.pending_len() >= self.settings.return_batch_size {
            self.flush_returns_locked(&mut state).await;
        }
    }

    /// Record which labels are shown on in-view elements, then synchronize.
    /// Handed-out labels missing from `labels` are treated as out of view
    /// and offered to other frames.
    pub async fn report_active_labels(&self, labels: Vec<Label>) {
        let mut state = self.state.lock().await;
        let mut rendered = HashSet::with_capacity(labels.len());
        for label in labels {
            if state.owned.contains(&label) {
                state.cache.remove(&label);
                state.given_up.remove(&label);
                rendered.insert(label);
            } else {
                debug!(frame_id = self.frame_id, label = %label, "Rendered label not owned");
            }
        }
        state.rendered = rendered;
        self.synchronize_locked(&mut state).await;
    }

    /// Send this frame's labels to the coordinator so orphans get freed and
    /// stale local beliefs get dropped.
    pub async fn synchronize_hints(&self) {
        let mut state = self.state.lock().await;
        self.synchronize_locked(&mut state).await;
    }

    /// Release every pending return now.
    pub async fn flush_returns(&self) {
        let mut state = self.state.lock().await;
        self.flush_returns_locked(&mut state).await;
    }

    /// The document in this frame was replaced. Local state is dropped; the
    /// main frame re-initializes the pool, other frames report that they
    /// hold nothing so their old labels are reclaimed.
    pub async fn navigated(&self) {
        let mut state = self.state.lock().await;
        state.clear();
        if self.is_main_frame() {
            self.call(Operation::Init).await;
        } else {
            self.synchronize_locked(&mut state).await;
        }
        info!(tab_id = self.tab_id, frame_id = self.frame_id, "Frame navigated");
    }

    /// Request a full hint refresh. Only the main frame's request resets the
    /// pool.
    pub async fn refresh(&self) {
        let mut state = self.state.lock().await;
        if self.is_main_frame() {
            state.clear();
        }
        self.call(Operation::Init).await;
    }

    /// Apply a pool event from the coordinator.
    pub async fn handle_event(&self, event: PoolEvent) {
        match event {
            PoolEvent::Reset => {
                self.state.lock().await.clear();
                self.tracker.pool_reset();
                debug!(frame_id = self.frame_id, "Pool reset, local labels dropped");
            }
            PoolEvent::Revoked { frame_id, labels } if frame_id == self.frame_id => {
                self.state.lock().await.drop_labels(&labels);
                self.tracker.labels_revoked(&labels);
                debug!(frame_id = self.frame_id, count = labels.len(), "Labels revoked");
            }
            PoolEvent::Revoked { .. } => {}
        }
    }

    /// Labels this frame believes it owns, sorted.
    pub async fn owned(&self) -> Vec<Label> {
        let state = self.state.lock().await;
        let mut owned: Vec<Label> = state.owned.iter().cloned().collect();
        owned.sort();
        owned
    }

    pub async fn cache_stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        CacheStats {
            primary: state.cache.primary_len(),
            secondary: state.cache.secondary_len(),
            pending: state.cache.pending_len(),
            owned: state.owned.len(),
        }
    }

    async fn claim_locked(&self, state: &mut FrameState, amount: usize) -> Vec<Label> {
        if amount == 0 {
            return Vec::new();
        }
        let labels = self
            .call(Operation::Claim { amount })
            .await
            .map(Reply::into_labels)
            .unwrap_or_default();
        if labels.len() < amount {
            debug!(
                frame_id = self.frame_id,
                requested = amount,
                granted = labels.len(),
                "Claim partially served"
            );
        }
        state.owned.extend(labels.iter().cloned());
        labels
    }

    async fn flush_returns_locked(&self, state: &mut FrameState) {
        let hints = state.cache.drain_pending();
        if hints.is_empty() {
            return;
        }
        for hint in &hints {
            state.owned.remove(hint);
            state.given_up.remove(hint);
        }
        debug!(frame_id = self.frame_id, count = hints.len(), "Releasing labels");
        self.call(Operation::Release { hints }).await;
    }

    async fn synchronize_locked(&self, state: &mut FrameState) {
        self.flush_returns_locked(state).await;
        let report = state.report();
        let stale = self
            .call(Operation::Synchronize { report })
            .await
            .map(Reply::into_labels)
            .unwrap_or_default();
        if !stale.is_empty() {
            warn!(
                frame_id = self.frame_id,
                count = stale.len(),
                "Dropping labels no longer assigned to this frame"
            );
            state.drop_labels(&stale);
            self.tracker.labels_revoked(&stale);
        }
    }

    /// Send one request. Failures abandon the operation: a closed channel
    /// means this frame is going away and nobody is left to observe it.
    async fn call(&self, operation: Operation) -> Option<Reply> {
        let name = operation.name();
        let envelope = Envelope::new(self.tab_id, self.frame_id, operation);
        match self.transport.send(envelope).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                self.note_failure(name, &e);
                None
            }
        }
    }

    fn note_failure(&self, operation: &str, error: &HintError) {
        if error.is_teardown() {
            self.detached.store(true, Ordering::Relaxed);
            debug!(frame_id = self.frame_id, operation, error = %error, "Coordinator gone, request abandoned");
        } else {
            warn!(frame_id = self.frame_id, operation, error = %error, "Coordinator request failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hintforge_config::CoordinatorSettings;
    use hintforge_coordinator::{Coordinator, CoordinatorHandle, MemoryPoolStore};
    use hintforge_core::LabelUniverse;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::broadcast;

    fn spawn_coordinator(universe: &[&str]) -> CoordinatorHandle {
        Coordinator::spawn(
            1,
            LabelUniverse::from_labels(universe.iter().copied()),
            Arc::new(MemoryPoolStore::new()),
            CoordinatorSettings::default(),
        )
    }

    fn client(handle: &CoordinatorHandle, frame: FrameId, batch: usize) -> FrameClient {
        client_with(handle, frame, batch, Arc::new(crate::NoopTracker))
    }

    fn client_with(
        handle: &CoordinatorHandle,
        frame: FrameId,
        batch: usize,
        tracker: Arc<dyn HintTracker>,
    ) -> FrameClient {
        FrameClient::new(
            1,
            frame,
            Arc::new(handle.clone()),
            tracker,
            ClientSettings {
                return_batch_size: batch,
                ..Default::default()
            },
        )
    }

    fn labels(texts: &[&str]) -> Vec<Label> {
        texts.iter().map(|t| Label::new(*t)).collect()
    }

    const UNIVERSE: &[&str] = &["a", "b", "c", "d", "aa", "ab", "ac", "ad"];

    #[derive(Default)]
    struct ScriptedTracker {
        out_of_view: StdMutex<Vec<Label>>,
        revoked: StdMutex<Vec<Label>>,
        resets: StdMutex<usize>,
    }

    impl HintTracker for ScriptedTracker {
        fn reclaim_out_of_view(&self, amount: usize) -> Vec<Label> {
            let mut pool = self.out_of_view.lock().unwrap();
            let n = amount.min(pool.len());
            pool.drain(..n).collect()
        }
        fn labels_revoked(&self, labels: &[Label]) {
            self.revoked.lock().unwrap().extend(labels.iter().cloned());
        }
        fn pool_reset(&self) {
            *self.resets.lock().unwrap() += 1;
        }
    }

    #[tokio::test]
    async fn test_cache_hints_claims_shortfall_in_one_batch() {
        let handle = spawn_coordinator(UNIVERSE);
        let client = client(&handle, 1, 16);

        client.cache_hints(2, 3).await;
        let stats = client.cache_stats().await;
        assert_eq!(stats.primary, 2);
        assert_eq!(stats.secondary, 3);
        assert_eq!(stats.owned, 5);

        assert_eq!(client.pop_hint().await, Some(Label::new("d")));
        assert_eq!(client.pop_hint().await, Some(Label::new("c")));
    }

    #[tokio::test]
    async fn test_cache_hints_surplus_is_batched_not_released() {
        let handle = spawn_coordinator(UNIVERSE);
        let client = client(&handle, 1, 16);

        client.cache_hints(4, 2).await;
        client.cache_hints(1, 0).await;
        let stats = client.cache_stats().await;
        assert_eq!(stats.primary, 1);
        assert_eq!(stats.secondary, 0);
        assert_eq!(stats.pending, 5);
        assert_eq!(handle.snapshot().await.unwrap().assigned.len(), 6);

        client.flush_returns().await;
        assert_eq!(handle.snapshot().await.unwrap().assigned.len(), 1);
        assert_eq!(client.owned().await, labels(&["d"]));
    }

    #[tokio::test]
    async fn test_cache_hints_reuses_pending_before_claiming() {
        let handle = spawn_coordinator(UNIVERSE);
        let client = client(&handle, 1, 16);

        client.cache_hints(3, 0).await;
        client.cache_hints(1, 0).await;
        client.cache_hints(3, 0).await;
        assert_eq!(handle.snapshot().await.unwrap().assigned.len(), 3);
        assert_eq!(client.cache_stats().await.primary, 3);
    }

    #[tokio::test]
    async fn test_pending_flushed_when_batch_full() {
        let handle = spawn_coordinator(UNIVERSE);
        let client = client(&handle, 1, 2);

        let claimed = client.claim_hints(3).await;
        client.return_hint(claimed[0].clone()).await;
        assert_eq!(handle.snapshot().await.unwrap().assigned.len(), 3);
        client.return_hint(claimed[1].clone()).await;
        assert_eq!(handle.snapshot().await.unwrap().assigned.len(), 1);
    }

    #[tokio::test]
    async fn test_pop_falls_back_to_out_of_view_labels() {
        let handle = spawn_coordinator(UNIVERSE);
        let tracker = Arc::new(ScriptedTracker::default());
        let client = client_with(&handle, 1, 16, tracker.clone());

        let shown = client.request_hints(1).await;
        client.report_active_labels(shown.clone()).await;
        *tracker.out_of_view.lock().unwrap() = shown.clone();

        assert_eq!(client.pop_hint().await, Some(shown[0].clone()));
        assert_eq!(handle.snapshot().await.unwrap().assigned.len(), 1);
    }

    #[tokio::test]
    async fn test_pop_takes_idle_label_from_other_frame() {
        let handle = spawn_coordinator(&["a", "b"]);
        let donor_tracker = Arc::new(ScriptedTracker::default());
        let donor = client_with(&handle, 2, 16, donor_tracker.clone());
        let needy = client(&handle, 3, 16);
        let mut events = handle.subscribe();

        assert_eq!(donor.request_hints(2).await, labels(&["b", "a"]));
        // "a" scrolled out of view.
        donor.report_active_labels(labels(&["b"])).await;

        let label = needy.pop_hint().await.unwrap();
        assert_eq!(label, Label::new("a"));
        assert_eq!(handle.snapshot().await.unwrap().assigned.get(&label), Some(&3));

        // The donor does not reuse a label it gave up, even before it hears
        // about the reassignment.
        *donor_tracker.out_of_view.lock().unwrap() = vec![label.clone()];
        assert_eq!(donor.pop_hint().await, None);

        donor.handle_event(events.recv().await.unwrap()).await;
        assert_eq!(donor.owned().await, labels(&["b"]));
        assert_eq!(*donor_tracker.revoked.lock().unwrap(), vec![label]);
    }

    #[tokio::test]
    async fn test_cached_labels_stay_with_their_frame() {
        let handle = spawn_coordinator(&["a", "b"]);
        let donor = client(&handle, 2, 16);
        let needy = client(&handle, 3, 16);

        donor.cache_hints(0, 2).await;
        donor.synchronize_hints().await;

        assert_eq!(needy.pop_hint().await, None);
        assert_eq!(donor.pop_hint().await, Some(Label::new("b")));
        assert_eq!(donor.pop_hint().await, Some(Label::new("a")));
        let assigned = handle.snapshot().await.unwrap().assigned;
        assert!(assigned.values().all(|frame| *frame == 2));
    }

    #[tokio::test]
    async fn test_handed_out_labels_are_not_offered_before_a_report() {
        let handle = spawn_coordinator(&["a", "b"]);
        let donor = client(&handle, 2, 16);
        let needy = client(&handle, 3, 16);

        donor.request_hints(1).await;
        donor.claim_hints(1).await;
        donor.synchronize_hints().await;
        assert_eq!(needy.pop_hint().await, None);
    }

    #[tokio::test]
    async fn test_returning_a_lost_label_does_not_free_it() {
        let handle = spawn_coordinator(&["a", "b"]);
        let donor = client(&handle, 2, 1);
        let needy = client(&handle, 3, 16);

        donor.request_hints(2).await;
        donor.report_active_labels(labels(&["b"])).await;
        let taken = needy.pop_hint().await.unwrap();

        donor.return_hint(taken.clone()).await;
        assert_eq!(client(&handle, 4, 16).claim_hints(1).await, Vec::<Label>::new());
        assert_eq!(handle.snapshot().await.unwrap().assigned.get(&taken), Some(&3));
    }

    #[tokio::test]
    async fn test_pop_returns_none_when_everything_is_exhausted() {
        let handle = spawn_coordinator(&["a"]);
        let first = client(&handle, 1, 16);
        let second = client(&handle, 2, 16);
        let shown = first.request_hints(1).await;
        first.report_active_labels(shown).await;
        assert_eq!(second.pop_hint().await, None);
    }

    #[tokio::test]
    async fn test_push_hint_reuses_label_first() {
        let handle = spawn_coordinator(UNIVERSE);
        let client = client(&handle, 1, 16);
        client.cache_hints(2, 0).await;
        let first = client.pop_hint().await.unwrap();
        client.push_hint(first.clone()).await;
        assert_eq!(client.pop_hint().await, Some(first));

        client.push_hint(Label::new("zz")).await;
        assert_eq!(client.cache_stats().await.primary, 1);
    }

    #[tokio::test]
    async fn test_synchronize_reclaims_labels_of_previous_document() {
        let handle = spawn_coordinator(UNIVERSE);
        let before_reload = client(&handle, 2, 16);
        before_reload.cache_hints(3, 0).await;
        drop(before_reload);

        let after_reload = client(&handle, 2, 16);
        after_reload.synchronize_hints().await;
        assert!(handle.snapshot().await.unwrap().assigned.is_empty());
    }

    #[tokio::test]
    async fn test_sub_frame_refresh_keeps_pool() {
        let handle = spawn_coordinator(UNIVERSE);
        let main = client(&handle, MAIN_FRAME, 16);
        let sub = client(&handle, 4, 16);
        main.claim_hints(2).await;
        sub.refresh().await;
        assert_eq!(handle.snapshot().await.unwrap().assigned.len(), 2);
        main.refresh().await;
        assert!(handle.snapshot().await.unwrap().assigned.is_empty());
        assert!(main.owned().await.is_empty());
    }

    #[tokio::test]
    async fn test_reset_event_clears_state() {
        let handle = spawn_coordinator(UNIVERSE);
        let tracker = Arc::new(ScriptedTracker::default());
        let client = client_with(&handle, 1, 16, tracker.clone());
        client.cache_hints(2, 2).await;
        client.handle_event(PoolEvent::Reset).await;
        assert_eq!(client.cache_stats().await.owned, 0);
        assert_eq!(*tracker.resets.lock().unwrap(), 1);
    }

    struct ClosedTransport;

    #[async_trait]
    impl Transport for ClosedTransport {
        async fn send(&self, _envelope: Envelope) -> Result<Reply, HintError> {
            Err(HintError::ChannelClosed("frame torn down".into()))
        }
        async fn subscribe(&self, _tab_id: TabId) -> Option<broadcast::Receiver<PoolEvent>> {
            None
        }
    }

    #[tokio::test]
    async fn test_closed_transport_is_silent() {
        let client = FrameClient::new(
            1,
            1,
            Arc::new(ClosedTransport),
            Arc::new(crate::NoopTracker),
            ClientSettings::default(),
        );
        assert!(client.request_hints(3).await.is_empty());
        assert_eq!(client.pop_hint().await, None);
        client.synchronize_hints().await;
        assert!(client.is_detached());
    }
}
