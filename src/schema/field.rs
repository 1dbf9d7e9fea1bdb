use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::core::{ModelError, Result, Value, timestamp_from_secs};

/// Stored stand-in for an empty string set, which the store cannot hold.
pub const EMPTY_SET_SENTINEL: &str = "0";

/// Stored form of an unset timestamp.
pub const UNSET_TIMESTAMP: &str = "0";

pub type DefaultFn = Arc<dyn Fn() -> Value + Send + Sync>;
pub type ExternalFn = Arc<dyn Fn(&Value) -> serde_json::Value + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Plain,
    Identity,
    ReadOnly,
    Timestamp,
    IdList,
    StringSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    Writable,
    /// Assigned while the entity is built, never afterwards.
    WriteOnce,
    ReadOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageRole {
    Ordinary,
    /// Folded into `pk` instead of being stored as its own attribute.
    IdentityComponent,
    MetadataOnly,
}

/// One attribute of an entity type: how it converts and who may write it.
#[derive(Clone)]
pub struct FieldDescriptor {
    name: String,
    kind: FieldKind,
    mutability: Mutability,
    role: StorageRole,
    default: DefaultFn,
    external: Option<ExternalFn>,
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("mutability", &self.mutability)
            .field("role", &self.role)
            .field("has_external_codec", &self.external.is_some())
            .finish()
    }
}

impl FieldDescriptor {
    fn new(name: impl Into<String>, kind: FieldKind, mutability: Mutability, role: StorageRole) -> Self {
        Self {
            name: name.into(),
            kind,
            mutability,
            role,
            default: Arc::new(|| Value::Null),
            external: None,
        }
    }

    pub fn plain(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Plain, Mutability::Writable, StorageRole::Ordinary)
    }

    pub fn identity(name: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::Identity,
            Mutability::WriteOnce,
            StorageRole::IdentityComponent,
        )
    }

    pub fn read_only(name: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::ReadOnly,
            Mutability::ReadOnly,
            StorageRole::MetadataOnly,
        )
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Timestamp, Mutability::Writable, StorageRole::Ordinary)
    }

    pub fn id_list(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::IdList, Mutability::Writable, StorageRole::Ordinary)
            .default_with(|| Value::List(Vec::new()))
    }

    pub fn string_set(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::StringSet, Mutability::Writable, StorageRole::Ordinary)
            .default_with(|| Value::StringSet(BTreeSet::new()))
    }

    /// Default evaluated each time an entity is built without this field.
    pub fn default_with<F>(mut self, producer: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Arc::new(producer);
        self
    }

    pub fn default_value_of(self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.default_with(move || value.clone())
    }

    pub fn to_external_with<F>(mut self, codec: F) -> Self
    where
        F: Fn(&Value) -> serde_json::Value + Send + Sync + 'static,
    {
        self.external = Some(Arc::new(codec));
        self
    }

    pub fn write_once(mut self) -> Self {
        self.mutability = Mutability::WriteOnce;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn mutability(&self) -> Mutability {
        self.mutability
    }

    pub fn role(&self) -> StorageRole {
        self.role
    }

    pub fn default_value(&self) -> Value {
        (self.default)()
    }

    /// Writable after construction (`update`, setters).
    pub fn is_writable(&self) -> bool {
        self.mutability == Mutability::Writable
    }

    /// Filled from arguments or defaults by the constructor's defaulting pass.
    pub fn is_constructable(&self) -> bool {
        match self.mutability {
            Mutability::Writable => true,
            Mutability::WriteOnce => self.role == StorageRole::Ordinary,
            Mutability::ReadOnly => false,
        }
    }

    pub fn is_identity_component(&self) -> bool {
        self.role == StorageRole::IdentityComponent
    }

    /// Stored as its own attribute in the store record.
    pub fn is_stored(&self) -> bool {
        self.role == StorageRole::Ordinary
    }

    /// Bring an assigned value into this field's in-memory shape.
    pub fn coerce(&self, value: Value) -> Result<Value> {
        let mismatch = |value: &Value| {
            ModelError::TypeMismatch(format!(
                "Field '{}' ({:?}) cannot hold {}",
                self.name,
                self.kind,
                value.type_name()
            ))
        };
        match self.kind {
            FieldKind::Plain | FieldKind::ReadOnly => Ok(value),
            FieldKind::Identity => match value {
                Value::Null | Value::Text(_) | Value::Integer(_) => Ok(value),
                other => Err(mismatch(&other)),
            },
            FieldKind::Timestamp => match value {
                Value::Null | Value::Timestamp(_) => Ok(value),
                Value::Integer(secs) => Ok(timestamp_from_secs(secs).into()),
                Value::Text(ref s) => match s.trim().parse::<i64>() {
                    Ok(secs) => Ok(timestamp_from_secs(secs).into()),
                    Err(_) if s.trim().is_empty() => Ok(Value::Null),
                    Err(_) => Err(mismatch(&value)),
                },
                other => Err(mismatch(&other)),
            },
            FieldKind::IdList => match value {
                Value::Null => Ok(Value::List(Vec::new())),
                Value::List(_) => Ok(value),
                other => Err(mismatch(&other)),
            },
            FieldKind::StringSet => match value {
                Value::Null => Ok(Value::StringSet(BTreeSet::new())),
                Value::StringSet(_) => Ok(value),
                Value::List(ref items) => match value.as_text_list() {
                    Some(texts) => Ok(Value::StringSet(
                        texts.into_iter().map(str::to_string).collect(),
                    )),
                    None => Err(mismatch(&Value::List(items.clone()))),
                },
                other => Err(mismatch(&other)),
            },
        }
    }

    pub fn to_store(&self, value: &Value) -> Value {
        match self.kind {
            FieldKind::Plain => trim_text(value),
            FieldKind::Identity | FieldKind::ReadOnly => value.clone(),
            FieldKind::Timestamp => match value {
                Value::Timestamp(t) => Value::Text(t.timestamp().to_string()),
                _ => Value::Text(UNSET_TIMESTAMP.to_string()),
            },
            FieldKind::IdList => match value {
                Value::Null => Value::List(Vec::new()),
                other => other.clone(),
            },
            FieldKind::StringSet => match value {
                Value::StringSet(set) if !set.is_empty() => value.clone(),
                Value::StringSet(_) | Value::Null => sentinel_set(),
                other => other.clone(),
            },
        }
    }

    pub fn from_store(&self, stored: &Value) -> Value {
        match self.kind {
            FieldKind::Plain => trim_text(stored),
            FieldKind::Identity | FieldKind::ReadOnly => stored.clone(),
            FieldKind::Timestamp => match stored {
                Value::Timestamp(_) => stored.clone(),
                other => other
                    .as_i64()
                    .and_then(timestamp_from_secs)
                    .map_or(Value::Null, Value::Timestamp),
            },
            FieldKind::IdList => match stored {
                Value::Null => Value::List(Vec::new()),
                other => other.clone(),
            },
            FieldKind::StringSet => match stored {
                Value::StringSet(set)
                    if set.len() == 1 && set.contains(EMPTY_SET_SENTINEL) =>
                {
                    Value::StringSet(BTreeSet::new())
                }
                Value::Null => Value::StringSet(BTreeSet::new()),
                other => other.clone(),
            },
        }
    }

    pub fn to_external(&self, value: &Value) -> serde_json::Value {
        if let Some(codec) = &self.external {
            return codec(value);
        }
        value.to_json()
    }

    /// Parse a raw external (JSON) input into this field's in-memory form.
    pub fn from_external(&self, json: &serde_json::Value) -> Result<Value> {
        self.coerce(Value::from_json(json)?)
    }

    /// `owner` names the entity in error messages.
    pub fn validate(&self, owner: &dyn fmt::Display, value: &Value) -> Result<()> {
        match self.kind {
            FieldKind::Identity if value.is_null() => Err(ModelError::Validation(format!(
                "{}#{} - Identity value is not set",
                owner, self.name
            ))),
            FieldKind::IdList => validate_id_list(owner, &self.name, value),
            _ => Ok(()),
        }
    }
}

fn trim_text(value: &Value) -> Value {
    match value {
        Value::Text(s) => Value::Text(s.trim().to_string()),
        other => other.clone(),
    }
}

fn sentinel_set() -> Value {
    Value::StringSet([EMPTY_SET_SENTINEL.to_string()].into())
}

fn validate_id_list(owner: &dyn fmt::Display, name: &str, value: &Value) -> Result<()> {
    let Some(items) = value.as_list() else {
        return Err(ModelError::Validation(format!(
            "{}#{} - Should be a list: {}",
            owner, name, value
        )));
    };

    let bad_values: Vec<String> = items
        .iter()
        .filter(|v| v.as_str().is_none())
        .map(ToString::to_string)
        .collect();
    if !bad_values.is_empty() {
        return Err(ModelError::Validation(format!(
            "{}#{} - Non-string values: {}",
            owner,
            name,
            bad_values.join(", ")
        )));
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for id in items.iter().filter_map(Value::as_str) {
        *counts.entry(id).or_default() += 1;
    }
    let duplicates: Vec<String> = counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(id, n)| format!("{} ({})", id, n))
        .collect();
    if !duplicates.is_empty() {
        return Err(ModelError::Validation(format!(
            "{}#{} - Duplicate IDs found: {}",
            owner,
            name,
            duplicates.join(", ")
        )));
    }
    Ok(())
}
