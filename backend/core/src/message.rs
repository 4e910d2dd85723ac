use serde::{Deserialize, Serialize};

use crate::label::Label;
use crate::types::{ActivityReport, FrameId, TabId};

/// A request from a frame to its tab's coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub tab_id: TabId,
    pub frame_id: FrameId,
    #[serde(flatten)]
    pub operation: Operation,
}

impl Envelope {
    pub fn new(tab_id: TabId, frame_id: FrameId, operation: Operation) -> Self {
        Self {
            tab_id,
            frame_id,
            operation,
        }
    }
}

/// Operations understood by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload", rename_all = "camelCase")]
pub enum Operation {
    /// Reset the pool. Only honoured for the main frame.
    Init,
    /// Assign up to `amount` labels to the sender.
    Claim { amount: usize },
    /// Give labels back to the pool.
    Release { hints: Vec<Label> },
    /// Free the sender's labels that are missing from `active`.
    ReclaimOrphans { active: Vec<Label> },
    /// Take idle labels away from other frames.
    ReclaimFromOtherFrames { amount: usize },
    /// Report the sender's labels; orphans are freed, stale ones returned.
    Synchronize { report: ActivityReport },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Init => "init",
            Operation::Claim { .. } => "claim",
            Operation::Release { .. } => "release",
            Operation::ReclaimOrphans { .. } => "reclaimOrphans",
            Operation::ReclaimFromOtherFrames { .. } => "reclaimFromOtherFrames",
            Operation::Synchronize { .. } => "synchronize",
        }
    }
}

/// Coordinator answer to an [`Envelope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "labels", rename_all = "snake_case")]
pub enum Reply {
    Labels(Vec<Label>),
    Empty,
}

impl Reply {
    /// The carried labels; an empty reply yields none.
    pub fn into_labels(self) -> Vec<Label> {
        match self {
            Reply::Labels(labels) => labels,
            Reply::Empty => Vec::new(),
        }
    }
}
