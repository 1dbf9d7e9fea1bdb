mod kind;

pub use kind::EntityKind;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::core::{Fields, ModelError, PK, Record, Result, Value, now};
use crate::schema::{CREATED_AT, DEACTIVATED_AT, EntitySchema, FieldDescriptor, MODIFIED_AT};
use crate::storage::StoreClient;

static NULL: Value = Value::Null;

/// One typed record instance. `K` supplies the schema and the `pk` rule.
pub struct Entity<K: EntityKind> {
    schema: Arc<EntitySchema>,
    values: BTreeMap<String, Value>,
    kind: PhantomData<fn() -> K>,
}

impl<K: EntityKind> Entity<K> {
    /// Build a fresh entity: identity components from `args`, every other
    /// field from `args` or its default.
    pub fn new(args: Fields) -> Result<Self> {
        let schema = K::schema()?;

        let unrecognized: Vec<String> = args
            .names()
            .filter(|name| !schema.has_field(name))
            .map(str::to_string)
            .collect();
        if !unrecognized.is_empty() {
            return Err(ModelError::UnrecognizedArguments {
                entity: K::TYPE_NAME.to_string(),
                names: unrecognized,
            });
        }

        let missing: Vec<String> = schema
            .identity_fields()
            .filter(|f| args.get(f.name()).is_none_or(Value::is_null))
            .map(|f| f.name().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ModelError::MissingIdentity {
                entity: K::TYPE_NAME.to_string(),
                fields: missing,
            });
        }

        let mut entity = Self {
            schema: schema.clone(),
            values: BTreeMap::new(),
            kind: PhantomData,
        };

        let mut identity = Fields::new();
        for field in schema.identity_fields() {
            let value = field.coerce(args.get(field.name()).cloned().unwrap_or(Value::Null))?;
            entity.assign_once(field, value.clone())?;
            identity.insert(field.name(), value);
        }

        let pk = K::format_pk(&identity)?;
        if let Some(supplied) = args.get(PK) {
            if supplied.as_str() != Some(pk.as_str()) {
                return Err(ModelError::ImmutableField {
                    field: format!("{}#{}", K::TYPE_NAME, PK),
                    current: pk,
                    attempted: supplied.to_string(),
                });
            }
        }
        entity.values.insert(PK.to_string(), Value::Text(pk));

        let owner = entity.to_string();
        for field in schema.identity_fields() {
            field.validate(&owner, entity.value(field.name()))?;
        }
        // Both lifecycle stamps of a new entity share one instant.
        let constructed_at = now();
        for field in schema.constructable_fields() {
            let value = match args.get(field.name()) {
                Some(supplied) => supplied.clone(),
                None if field.name() == CREATED_AT || field.name() == MODIFIED_AT => {
                    Value::Timestamp(constructed_at)
                }
                None => field.default_value(),
            };
            let value = field.coerce(value)?;
            field.validate(&owner, &value)?;
            entity.values.insert(field.name().to_string(), value);
        }

        Ok(entity)
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    pub fn pk(&self) -> &str {
        self.values.get(PK).and_then(Value::as_str).unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// The field's value, `Null` when unknown.
    pub fn value(&self, name: &str) -> &Value {
        self.values.get(name).unwrap_or(&NULL)
    }

    pub fn text(&self, name: &str) -> &str {
        self.value(name).as_str().unwrap_or_default()
    }

    pub fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        self.value(name).as_timestamp()
    }

    pub fn ids(&self, name: &str) -> Vec<&str> {
        self.value(name)
            .as_list()
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn string_set(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.value(name).as_string_set()
    }

    /// Assign one field, honoring its mutability. Writable fields are
    /// validated before the value is committed.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let schema = self.schema.clone();
        let field = schema
            .field(name)
            .ok_or_else(|| ModelError::UnrecognizedArguments {
                entity: K::TYPE_NAME.to_string(),
                names: vec![name.to_string()],
            })?;
        let value = field.coerce(value.into())?;
        if !field.is_writable() {
            return self.assign_once(field, value);
        }
        field.validate(&*self, &value)?;
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Re-assigning the current value is a no-op; anything else fails once set.
    fn assign_once(&mut self, field: &FieldDescriptor, value: Value) -> Result<()> {
        let current = self.value(field.name());
        if current.is_null() {
            self.values.insert(field.name().to_string(), value);
            return Ok(());
        }
        if *current == value {
            return Ok(());
        }
        Err(ModelError::ImmutableField {
            field: format!("{}#{}", K::TYPE_NAME, field.name()),
            current: current.to_string(),
            attempted: value.to_string(),
        })
    }

    /// Partial update: only writable fields present in `new_values` change.
    /// Everything is validated before anything is applied.
    pub fn update(&mut self, new_values: &Fields) -> Result<()> {
        let schema = self.schema.clone();
        let mut staged = Vec::new();
        for field in schema.writable_fields() {
            let Some(value) = new_values.get(field.name()) else {
                continue;
            };
            let value = field.coerce(value.clone())?;
            field.validate(&*self, &value)?;
            staged.push((field.name().to_string(), value));
        }
        for name in new_values.names() {
            if !schema.field(name).is_some_and(FieldDescriptor::is_writable) {
                debug!("{} update ignores '{}'", self, name);
            }
        }
        self.values.extend(staged);
        Ok(())
    }

    /// Parse a raw JSON body into field values using each field's input codec.
    /// Keys the schema does not know are passed through untouched.
    pub fn fields_from_external(body: &serde_json::Map<String, serde_json::Value>) -> Result<Fields> {
        let schema = K::schema()?;
        let mut fields = Fields::new();
        for (name, json) in body {
            let value = match schema.field(name) {
                Some(field) => field.from_external(json)?,
                None => Value::from_json(json)?,
            };
            fields.insert(name.clone(), value);
        }
        Ok(fields)
    }

    /// `pk` plus every stored field through its store codec.
    pub fn to_store_record(&self) -> Record {
        let mut record = Record::new(self.pk());
        for field in self.schema.stored_fields() {
            record.set(field.name(), field.to_store(self.value(field.name())));
        }
        record
    }

    /// Every registered field through its external codec, as one flat object.
    pub fn to_external(&self) -> serde_json::Value {
        let object: serde_json::Map<String, serde_json::Value> = self
            .schema
            .fields()
            .iter()
            .map(|f| (f.name().to_string(), f.to_external(self.value(f.name()))))
            .collect();
        serde_json::Value::Object(object)
    }

    /// `None` for an absent or empty record. Identity values come from the
    /// record's `pk`; `overrides` win over both.
    pub fn from_store_record(record: Option<Record>, overrides: Fields) -> Result<Option<Self>> {
        let Some(record) = record.filter(|r| !r.is_empty()) else {
            return Ok(None);
        };
        let schema = K::schema()?;

        let mut params = Fields::new();
        for field in schema.constructable_fields() {
            if let Some(stored) = record.get(field.name()) {
                params.insert(field.name(), field.from_store(stored));
            }
        }
        if let Some(pk) = record.pk() {
            params.merge(K::identity_from_pk(pk)?);
        }
        params.merge(overrides);

        let mut entity = Self::new(params)?;
        K::after_load(&mut entity)?;
        Ok(Some(entity))
    }

    /// Rehydrate a record found by scanning; records of other types yield `None`.
    pub fn from_scanned_record(record: &Record) -> Result<Option<Self>> {
        let Some(pk) = record.pk() else {
            return Ok(None);
        };
        match K::identity_from_pk(pk) {
            Ok(_) => Self::from_store_record(Some(record.clone()), Fields::new()),
            Err(ModelError::InvalidKey { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn read_optional(store: &StoreClient, identity: Fields) -> Result<Option<Self>> {
        let pk = K::format_pk(&identity)?;
        let record = store.read(&pk).await?;
        Self::from_store_record(record, identity)
    }

    /// Like [`Entity::read_optional`] but a missing record is a `NotFound` error.
    pub async fn read(store: &StoreClient, identity: Fields) -> Result<Self> {
        let pk = K::format_pk(&identity)?;
        Self::read_optional(store, identity)
            .await?
            .ok_or_else(|| ModelError::NotFound(format!("{} {}", K::TYPE_NAME, pk)))
    }

    /// Stamp `modified_at` and store the record.
    pub async fn write(&mut self, store: &StoreClient) -> Result<()> {
        self.values
            .insert(MODIFIED_AT.to_string(), Value::Timestamp(now()));
        store.write(self.to_store_record()).await
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp(CREATED_AT)
    }

    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp(MODIFIED_AT)
    }

    pub fn deactivated_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp(DEACTIVATED_AT)
    }

    pub fn is_active(&self) -> bool {
        self.deactivated_at().is_none()
    }

    /// Soft delete.
    pub fn deactivate(&mut self) -> Result<()> {
        self.set(DEACTIVATED_AT, now())
    }

    pub fn reactivate(&mut self) -> Result<()> {
        self.set(DEACTIVATED_AT, Value::Null)
    }

    /// Move `id` to the front of an id list, inserting it if absent.
    /// Returns whether the list changed.
    pub fn prepend_id(&mut self, name: &str, id: &str) -> Result<bool> {
        let current = self.ids(name);
        if current.first() == Some(&id) {
            return Ok(false);
        }
        let mut list = vec![Value::from(id)];
        list.extend(
            current
                .into_iter()
                .filter(|existing| *existing != id)
                .map(Value::from),
        );
        self.set(name, Value::List(list))?;
        Ok(true)
    }

    pub fn remove_id(&mut self, name: &str, id: &str) -> Result<bool> {
        let current = self.ids(name);
        if !current.contains(&id) {
            return Ok(false);
        }
        let list: Vec<Value> = current
            .into_iter()
            .filter(|existing| *existing != id)
            .map(Value::from)
            .collect();
        self.set(name, Value::List(list))?;
        Ok(true)
    }

    pub fn insert_into_set(&mut self, name: &str, item: &str) -> Result<bool> {
        let mut set = self.string_set(name).cloned().unwrap_or_default();
        if !set.insert(item.to_string()) {
            return Ok(false);
        }
        self.set(name, Value::StringSet(set))?;
        Ok(true)
    }

    pub fn remove_from_set(&mut self, name: &str, item: &str) -> Result<bool> {
        let mut set = self.string_set(name).cloned().unwrap_or_default();
        if !set.remove(item) {
            return Ok(false);
        }
        self.set(name, Value::StringSet(set))?;
        Ok(true)
    }
}

impl<K: EntityKind> Clone for Entity<K> {
    fn clone(&self) -> Self {
        Self {
            schema: self.schema.clone(),
            values: self.values.clone(),
            kind: PhantomData,
        }
    }
}

impl<K: EntityKind> PartialEq for Entity<K> {
    fn eq(&self, other: &Self) -> bool {
        self.to_store_record() == other.to_store_record()
    }
}

impl<K: EntityKind> Eq for Entity<K> {}

impl<K: EntityKind> Hash for Entity<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_store_record().hash(state);
    }
}

impl<K: EntityKind> fmt::Display for Entity<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self
            .schema
            .identity_fields()
            .map(|field| format!("{}: {}", field.name(), self.value(field.name())))
            .collect();
        write!(f, "{}: {}", K::TYPE_NAME, ids.join(", "))
    }
}

impl<K: EntityKind> fmt::Debug for Entity<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("type", &K::TYPE_NAME)
            .field("values", &self.values)
            .finish()
    }
}
