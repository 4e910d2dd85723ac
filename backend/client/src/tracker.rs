//! Boundary to the frame's element tracker.
//!
//! The tracker decides which elements get hints and renders them. It calls
//! into [`crate::FrameClient`] for labels and receives the callbacks below.

use hintforge_core::Label;

pub trait HintTracker: Send + Sync {
    /// Strip up to `amount` labels from hinted elements that are out of view
    /// and return them for reuse.
    fn reclaim_out_of_view(&self, _amount: usize) -> Vec<Label> {
        Vec::new()
    }

    /// These labels now belong to someone else; stop displaying them.
    fn labels_revoked(&self, _labels: &[Label]) {}

    /// The pool was reset; every label held so far is void.
    fn pool_reset(&self) {}
}

/// Tracker for frames without hintable content.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracker;

impl HintTracker for NoopTracker {}
