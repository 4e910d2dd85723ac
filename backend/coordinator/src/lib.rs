pub mod coordinator;
pub mod handle;
pub mod hub;
pub mod store;

pub use coordinator::Coordinator;
pub use handle::{CoordinatorHandle, PoolSnapshot};
pub use hub::CoordinatorHub;
pub use store::{MemoryPoolStore, SqlitePoolStore};
