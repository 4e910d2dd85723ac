use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::HintError;
use crate::label::{free_order, sort_free, Label, LabelUniverse};
use crate::types::FrameId;
use crate::wire::{PersistedPool, WireContainer};

/// The labels of one tab, partitioned into free and assigned.
///
/// `free` is kept in free-sequence order (see [`free_order`]) so claims pop
/// the shortest labels first.
#[derive(Debug, Clone)]
pub struct LabelPool {
    universe: LabelUniverse,
    free: Vec<Label>,
    assigned: HashMap<Label, FrameId>,
}

impl LabelPool {
    /// A fully free pool over `universe`.
    pub fn new(universe: LabelUniverse) -> Self {
        let free = universe.sorted();
        Self {
            universe,
            free,
            assigned: HashMap::new(),
        }
    }

    /// Return every label to the free sequence.
    pub fn reset(&mut self) {
        self.free = self.universe.sorted();
        self.assigned.clear();
    }

    /// Take up to `amount` labels from the tail and assign them to `frame`.
    ///
    /// Returns fewer labels when the pool runs dry.
    pub fn claim(&mut self, frame: FrameId, amount: usize) -> Vec<Label> {
        let take = amount.min(self.free.len());
        let mut claimed = Vec::with_capacity(take);
        for _ in 0..take {
            if let Some(label) = self.free.pop() {
                self.assigned.insert(label.clone(), frame);
                claimed.push(label);
            }
        }
        if claimed.len() < amount {
            debug!(
                frame_id = frame,
                requested = amount,
                granted = claimed.len(),
                "Pool exhausted, partial claim"
            );
        }
        claimed
    }

    /// Free the given labels if they are assigned to `frame`. Anything else
    /// is ignored, so a stale, repeated or foreign release changes nothing.
    /// Returns what was freed.
    pub fn release(&mut self, frame: FrameId, hints: &[Label]) -> Vec<Label> {
        let mut freed = Vec::new();
        for hint in hints {
            if self.assigned.get(hint) != Some(&frame) {
                continue;
            }
            self.assigned.remove(hint);
            self.insert_free(hint.clone());
            freed.push(hint.clone());
        }
        freed
    }

    /// Free labels assigned to `frame` that are missing from `active`.
    pub fn reclaim_orphans(&mut self, frame: FrameId, active: &HashSet<Label>) -> Vec<Label> {
        let mut orphans: Vec<Label> = self
            .assigned
            .iter()
            .filter(|(label, owner)| **owner == frame && !active.contains(*label))
            .map(|(label, _)| label.clone())
            .collect();
        orphans.sort();
        self.release(frame, &orphans)
    }

    /// Move an assigned label to another frame. Returns false when the label
    /// is not assigned at all.
    pub fn reassign(&mut self, label: &Label, to: FrameId) -> bool {
        match self.assigned.get_mut(label) {
            Some(owner) => {
                *owner = to;
                true
            }
            None => false,
        }
    }

    pub fn owner(&self, label: &Label) -> Option<FrameId> {
        self.assigned.get(label).copied()
    }

    /// Labels assigned to `frame`, sorted.
    pub fn assigned_to(&self, frame: FrameId) -> Vec<Label> {
        let mut labels: Vec<Label> = self
            .assigned
            .iter()
            .filter(|(_, owner)| **owner == frame)
            .map(|(label, _)| label.clone())
            .collect();
        labels.sort();
        labels
    }

    /// Frames that currently hold at least one label, ascending.
    pub fn frames(&self) -> Vec<FrameId> {
        let mut frames: Vec<FrameId> = self.assigned.values().copied().collect();
        frames.sort_unstable();
        frames.dedup();
        frames
    }

    pub fn free(&self) -> &[Label] {
        &self.free
    }

    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    pub fn assigned_len(&self) -> usize {
        self.assigned.len()
    }

    pub fn universe(&self) -> &LabelUniverse {
        &self.universe
    }

    /// Verify the partition and ordering invariants.
    pub fn check_invariants(&self) -> Result<(), HintError> {
        let mut seen = HashSet::with_capacity(self.universe.len());
        for label in &self.free {
            if !self.universe.contains(label) {
                return Err(HintError::CorruptState(format!(
                    "free label '{label}' is outside the universe"
                )));
            }
            if self.assigned.contains_key(label) {
                return Err(HintError::CorruptState(format!(
                    "label '{label}' is both free and assigned"
                )));
            }
            if !seen.insert(label) {
                return Err(HintError::CorruptState(format!(
                    "label '{label}' is free twice"
                )));
            }
        }
        for label in self.assigned.keys() {
            if !self.universe.contains(label) {
                return Err(HintError::CorruptState(format!(
                    "assigned label '{label}' is outside the universe"
                )));
            }
        }
        if self.free.len() + self.assigned.len() != self.universe.len() {
            return Err(HintError::CorruptState(format!(
                "{} free + {} assigned does not cover {} labels",
                self.free.len(),
                self.assigned.len(),
                self.universe.len()
            )));
        }
        if self
            .free
            .windows(2)
            .any(|w| free_order(&w[0], &w[1]).is_gt())
        {
            return Err(HintError::CorruptState("free sequence is unsorted".into()));
        }
        Ok(())
    }

    pub fn to_persisted(&self) -> PersistedPool {
        PersistedPool {
            free: self.free.clone(),
            assigned: WireContainer::from_map(&self.assigned),
        }
    }

    /// Rebuild a pool from storage, rejecting state that does not partition
    /// `universe` exactly.
    pub fn from_persisted(
        universe: LabelUniverse,
        persisted: PersistedPool,
    ) -> Result<Self, HintError> {
        let mut free = persisted.free;
        sort_free(&mut free);
        let pool = Self {
            universe,
            free,
            assigned: persisted.assigned.into_map(),
        };
        pool.check_invariants()?;
        Ok(pool)
    }

    fn insert_free(&mut self, label: Label) {
        let at = self
            .free
            .binary_search_by(|probe| free_order(probe, &label))
            .unwrap_or_else(|pos| pos);
        self.free.insert(at, label);
    }
}
