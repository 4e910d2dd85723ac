pub mod cache;
pub mod frame_client;
pub mod sync;
pub mod tracker;

pub use cache::FrameCache;
pub use frame_client::{CacheStats, FrameClient};
pub use sync::{run_sync_loop, spawn_event_listener, spawn_sync_loop};
pub use tracker::{HintTracker, NoopTracker};
