pub mod client;
pub mod counter;
pub mod engine;
pub mod memory;
pub mod persistence;
pub mod table;

pub use client::StoreClient;
pub use counter::{atomic_increment, successor};
pub use engine::KvStore;
pub use memory::InMemoryStore;
pub use persistence::{DurabilityMode, FileStore, SnapshotManager, StoreSnapshot};
pub use table::Table;
