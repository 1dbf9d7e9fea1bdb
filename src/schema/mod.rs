pub mod field;
pub mod registry;

pub use field::{
    EMPTY_SET_SENTINEL, FieldDescriptor, FieldKind, Mutability, StorageRole, UNSET_TIMESTAMP,
};
pub use registry::{
    CREATED_AT, DEACTIVATED_AT, EntitySchema, MODIFIED_AT, SchemaBuilder, registered_entities,
    schema_for,
};
