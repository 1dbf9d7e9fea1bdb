use std::any::TypeId;
use std::sync::Arc;

use super::Entity;
use crate::core::{Fields, Result};
use crate::schema::{EntitySchema, SchemaBuilder, schema_for};

/// Per-type behavior of an entity: its fields and its `pk` rule.
pub trait EntityKind: Sized + Send + Sync + 'static {
    const TYPE_NAME: &'static str;

    /// Register the type's own fields; lifecycle fields are already present.
    fn define(schema: SchemaBuilder) -> SchemaBuilder;

    /// Format the primary key from the identity-component values.
    fn format_pk(identity: &Fields) -> Result<String>;

    /// Inverse of [`EntityKind::format_pk`]. Fails with `InvalidKey` for keys
    /// that do not belong to this type.
    fn identity_from_pk(pk: &str) -> Result<Fields>;

    /// Runs after an entity is rehydrated from a store record.
    fn after_load(_entity: &mut Entity<Self>) -> Result<()> {
        Ok(())
    }

    fn schema() -> Result<Arc<EntitySchema>> {
        schema_for(TypeId::of::<Self>(), || {
            Self::define(SchemaBuilder::new(Self::TYPE_NAME)).build()
        })
    }
}
