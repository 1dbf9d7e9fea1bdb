// ============================================================================
// kvmodel Library
// ============================================================================

pub mod connection;
pub mod core;
pub mod entity;
pub mod handler;
pub mod model;
pub mod schema;
pub mod storage;

// Re-export main types for convenience
pub use connection::StoreConfig;
pub use core::{ErrorClass, Fields, ModelError, Record, Result, Value};
pub use entity::{Entity, EntityKind};
pub use handler::{RequestContext, restricted_update};
pub use model::{AdminRegistry, Contact, Group, User, register_all};
pub use schema::{EntitySchema, FieldDescriptor, FieldKind, SchemaBuilder, registered_entities};
pub use storage::{DurabilityMode, FileStore, InMemoryStore, KvStore, StoreClient, successor};
