pub mod error;
pub mod event;
pub mod label;
pub mod message;
pub mod pool;
pub mod traits;
pub mod types;
pub mod wire;

pub use error::HintError;
pub use event::PoolEvent;
pub use label::{sort_free, Label, LabelUniverse, DEFAULT_ALPHABET};
pub use message::{Envelope, Operation, Reply};
pub use pool::LabelPool;
pub use traits::{PoolStore, Transport};
pub use types::{ActivityReport, FrameId, TabId, MAIN_FRAME};
pub use wire::{pool_key, PersistedPool, WireContainer};
