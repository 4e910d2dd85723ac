use serde::{Deserialize, Serialize};

use crate::label::Label;
use crate::types::FrameId;

/// Notifications a coordinator broadcasts to every frame of its tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PoolEvent {
    /// The pool was re-initialized; every previously held label is void.
    Reset,
    /// Labels were taken from `frame_id` and handed to another frame.
    Revoked { frame_id: FrameId, labels: Vec<Label> },
}

impl PoolEvent {
    /// Whether this event concerns the given frame.
    pub fn affects(&self, frame: FrameId) -> bool {
        match self {
            PoolEvent::Reset => true,
            PoolEvent::Revoked { frame_id, .. } => *frame_id == frame,
        }
    }
}

impl std::fmt::Display for PoolEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolEvent::Reset => write!(f, "reset"),
            PoolEvent::Revoked { frame_id, labels } => {
                write!(f, "revoked {} from frame {}", labels.len(), frame_id)
            }
        }
    }
}
