use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use lazy_static::lazy_static;

use super::field::{FieldDescriptor, FieldKind};
use crate::core::{ModelError, PK, Result, Value, now};

pub const CREATED_AT: &str = "created_at";
pub const MODIFIED_AT: &str = "modified_at";
pub const DEACTIVATED_AT: &str = "deactivated_at";

/// The ordered field set of one entity type.
#[derive(Debug)]
pub struct EntitySchema {
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize>,
}

impl EntitySchema {
    pub fn builder(type_name: &'static str) -> SchemaBuilder {
        SchemaBuilder::new(type_name)
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All fields in registration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(FieldDescriptor::name)
    }

    pub fn identity_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_identity_component())
    }

    pub fn constructable_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_constructable())
    }

    pub fn writable_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_writable())
    }

    pub fn stored_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_stored())
    }
}

/// Collects field registrations; the first duplicate name is reported by `build`.
pub struct SchemaBuilder {
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize>,
    duplicate: Option<String>,
}

impl SchemaBuilder {
    /// Starts with the fields every entity carries: `pk` and the lifecycle timestamps.
    pub fn new(type_name: &'static str) -> Self {
        let builder = Self {
            type_name,
            fields: Vec::new(),
            index: HashMap::new(),
            duplicate: None,
        };
        builder
            .descriptor(FieldDescriptor::read_only(PK))
            .descriptor(
                FieldDescriptor::timestamp(CREATED_AT)
                    .write_once()
                    .default_with(|| Value::Timestamp(now())),
            )
            .descriptor(
                FieldDescriptor::timestamp(MODIFIED_AT).default_with(|| Value::Timestamp(now())),
            )
            .descriptor(FieldDescriptor::timestamp(DEACTIVATED_AT))
    }

    pub fn descriptor(mut self, field: FieldDescriptor) -> Self {
        let name = field.name().to_string();
        if self.index.contains_key(&name) {
            self.duplicate.get_or_insert(name);
            return self;
        }
        self.index.insert(name, self.fields.len());
        self.fields.push(field);
        self
    }

    /// Generic registration: names ending in `_set` become string sets.
    pub fn field<F>(self, name: &str, default: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        let field = if name.ends_with("_set") {
            FieldDescriptor::string_set(name)
        } else {
            FieldDescriptor::plain(name)
        };
        self.descriptor(field.default_with(default))
    }

    pub fn identity(self, name: &str) -> Self {
        self.descriptor(FieldDescriptor::identity(name))
    }

    pub fn text(self, name: &str, default: &str) -> Self {
        self.descriptor(FieldDescriptor::plain(name).default_value_of(default))
    }

    pub fn timestamp(self, name: &str) -> Self {
        self.descriptor(FieldDescriptor::timestamp(name))
    }

    pub fn id_list(self, name: &str) -> Self {
        self.descriptor(FieldDescriptor::id_list(name))
    }

    pub fn string_set(self, name: &str) -> Self {
        self.descriptor(FieldDescriptor::string_set(name))
    }

    pub fn build(self) -> Result<EntitySchema> {
        if let Some(field) = self.duplicate {
            return Err(ModelError::DuplicateField {
                entity: self.type_name.to_string(),
                field,
            });
        }
        if !self
            .fields
            .iter()
            .any(|f| f.kind() == FieldKind::Identity)
        {
            return Err(ModelError::MissingIdentity {
                entity: self.type_name.to_string(),
                fields: Vec::new(),
            });
        }
        Ok(EntitySchema {
            type_name: self.type_name,
            fields: self.fields,
            index: self.index,
        })
    }
}

lazy_static! {
    static ref SCHEMAS: RwLock<HashMap<TypeId, Arc<EntitySchema>>> = RwLock::new(HashMap::new());
}

/// Schema for the type keyed by `type_id`, built by `define` on first use and
/// shared for the rest of the process. A failed build is not cached.
pub fn schema_for<F>(type_id: TypeId, define: F) -> Result<Arc<EntitySchema>>
where
    F: FnOnce() -> Result<EntitySchema>,
{
    if let Some(schema) = SCHEMAS.read()?.get(&type_id) {
        return Ok(schema.clone());
    }
    let built = Arc::new(define()?);
    let mut schemas = SCHEMAS.write()?;
    Ok(schemas.entry(type_id).or_insert(built).clone())
}

/// Names of every entity type whose schema has been built, sorted.
pub fn registered_entities() -> Result<Vec<&'static str>> {
    let mut names: Vec<&'static str> = SCHEMAS.read()?.values().map(|s| s.type_name()).collect();
    names.sort_unstable();
    Ok(names)
}
