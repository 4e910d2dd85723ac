use std::collections::VecDeque;

use hintforge_core::Label;

/// A frame's local stock of labels.
///
/// `primary` covers the elements the tracker says need a hint now,
/// `secondary` holds extra stock for elements likely to need one soon.
/// Both keep the most desirable label at the front. `pending_return` holds
/// surplus labels until they are reused or released in a batch.
#[derive(Debug, Default, Clone)]
pub struct FrameCache {
    primary: VecDeque<Label>,
    secondary: VecDeque<Label>,
    pending_return: Vec<Label>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next label to hand out: primary first, then secondary.
    pub fn take(&mut self) -> Option<Label> {
        self.primary
            .pop_front()
            .or_else(|| self.secondary.pop_front())
    }

    /// Reuse a label waiting to be released.
    pub fn take_pending(&mut self) -> Option<Label> {
        self.pending_return.pop()
    }

    /// Put a label back at the front of the primary tier.
    pub fn put_back(&mut self, label: Label) {
        self.primary.push_front(label);
    }

    /// Append fresh labels behind the existing stock.
    pub fn extend(&mut self, labels: impl IntoIterator<Item = Label>) {
        self.secondary.extend(labels);
    }

    /// Move labels between tiers so primary holds at most `necessary`,
    /// topping it up from secondary when short.
    pub fn rebalance(&mut self, necessary: usize) {
        while self.primary.len() < necessary {
            match self.secondary.pop_front() {
                Some(label) => self.primary.push_back(label),
                None => break,
            }
        }
        while self.primary.len() > necessary {
            match self.primary.pop_back() {
                Some(label) => self.secondary.push_front(label),
                None => break,
            }
        }
    }

    /// Move stock beyond `total` into pending return, least desirable first.
    /// Returns how many labels moved.
    pub fn trim_to(&mut self, total: usize) -> usize {
        let mut moved = 0;
        while self.cached_len() > total {
            let label = self
                .secondary
                .pop_back()
                .or_else(|| self.primary.pop_back());
            match label {
                Some(label) => {
                    self.pending_return.push(label);
                    moved += 1;
                }
                None => break,
            }
        }
        moved
    }

    /// Bring pending labels back into stock for reuse.
    pub fn absorb_pending(&mut self) -> usize {
        let count = self.pending_return.len();
        self.secondary.extend(self.pending_return.drain(..).rev());
        count
    }

    /// Queue a label for release.
    pub fn queue_return(&mut self, label: Label) {
        self.pending_return.push(label);
    }

    /// Empty the pending queue, returning its labels.
    pub fn drain_pending(&mut self) -> Vec<Label> {
        std::mem::take(&mut self.pending_return)
    }

    /// Drop a label wherever it is held. Returns whether it was found.
    pub fn remove(&mut self, label: &Label) -> bool {
        let before = self.total_len();
        self.primary.retain(|l| l != label);
        self.secondary.retain(|l| l != label);
        self.pending_return.retain(|l| l != label);
        self.total_len() != before
    }

    pub fn clear(&mut self) {
        self.primary.clear();
        self.secondary.clear();
        self.pending_return.clear();
    }

    /// Every label held, including pending ones.
    pub fn labels(&self) -> Vec<Label> {
        self.primary
            .iter()
            .chain(self.secondary.iter())
            .chain(self.pending_return.iter())
            .cloned()
            .collect()
    }

    pub fn primary_len(&self) -> usize {
        self.primary.len()
    }

    pub fn secondary_len(&self) -> usize {
        self.secondary.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending_return.len()
    }

    /// Labels available for immediate use.
    pub fn cached_len(&self) -> usize {
        self.primary.len() + self.secondary.len()
    }

    pub fn total_len(&self) -> usize {
        self.cached_len() + self.pending_return.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }
}
