use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::label::Label;

/// Identifies a browser tab. Every tab has its own independent pool.
pub type TabId = u64;

/// Identifies a frame within a tab.
pub type FrameId = u32;

/// Frame id of a tab's main document.
pub const MAIN_FRAME: FrameId = 0;

/// What a frame believes it owns, as sent with a synchronize request.
///
/// `held` labels are ones the frame may still hand out or show: rendered on
/// elements in view, cached or waiting to be returned. `idle` labels sit on
/// elements that scrolled away and have been given up by the frame; only
/// these may be handed to other frames.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityReport {
    #[serde(default)]
    pub held: Vec<Label>,
    #[serde(default)]
    pub idle: Vec<Label>,
}

impl ActivityReport {
    pub fn new(held: Vec<Label>, idle: Vec<Label>) -> Self {
        Self { held, idle }
    }

    /// Every label the frame still considers its own.
    pub fn active_set(&self) -> HashSet<Label> {
        self.held.iter().chain(self.idle.iter()).cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty() && self.idle.is_empty()
    }

    /// Drop a label from the report, wherever it appears.
    pub fn forget(&mut self, label: &Label) {
        self.held.retain(|l| l != label);
        self.idle.retain(|l| l != label);
    }
}
