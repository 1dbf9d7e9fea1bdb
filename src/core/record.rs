use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{ModelError, Result, Value};

pub const PK: &str = "pk";

/// A flat store record. The `pk` attribute is the partition key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    attributes: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(pk: impl Into<String>) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(PK.to_string(), Value::Text(pk.into()));
        Self { attributes }
    }

    pub fn pk(&self) -> Option<&str> {
        self.attributes.get(PK).and_then(Value::as_str)
    }

    /// The partition key, or an error for records that were built without one.
    pub fn require_pk(&self) -> Result<&str> {
        self.pk()
            .ok_or_else(|| ModelError::Storage("Oops: no pk".to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.attributes.iter()
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

/// Named values handed to entity constructors and `update`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    values: BTreeMap<String, Value>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Later values win.
    pub fn merge(&mut self, other: Fields) {
        self.values.extend(other.values);
    }

    pub fn text(&self, name: &str) -> Result<&str> {
        match self.values.get(name) {
            Some(Value::Text(s)) => Ok(s),
            Some(other) => Err(ModelError::TypeMismatch(format!(
                "Expected TEXT for '{}', got {}",
                name,
                other.type_name()
            ))),
            None => Err(ModelError::TypeMismatch(format!("Missing '{}'", name))),
        }
    }

    pub fn integer(&self, name: &str) -> Result<i64> {
        match self.values.get(name) {
            Some(value) => value.as_i64().ok_or_else(|| {
                ModelError::TypeMismatch(format!(
                    "Expected INTEGER for '{}', got {}",
                    name,
                    value.type_name()
                ))
            }),
            None => Err(ModelError::TypeMismatch(format!("Missing '{}'", name))),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
