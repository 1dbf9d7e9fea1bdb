use std::collections::HashMap;

use crate::core::{ModelError, Result, Record, Value};

/// The single logical table: records keyed by `pk`.
///
/// Not synchronized on its own; the stores wrap it in a lock and run every
/// check-and-apply sequence under that one guard.
#[derive(Debug, Clone, Default)]
pub struct Table {
    records: HashMap<String, Record>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Result<Self> {
        let mut table = Self::new();
        for record in records {
            table.put(record)?;
        }
        Ok(table)
    }

    pub fn get(&self, pk: &str) -> Option<&Record> {
        self.records.get(pk)
    }

    pub fn put(&mut self, record: Record) -> Result<()> {
        let pk = record.require_pk()?.to_string();
        self.records.insert(pk, record);
        Ok(())
    }

    pub fn put_if_absent(&mut self, record: Record) -> Result<()> {
        let pk = record.require_pk()?.to_string();
        if self.records.contains_key(&pk) {
            return Err(ModelError::ConditionFailed(pk));
        }
        self.records.insert(pk, record);
        Ok(())
    }

    /// Sets `field` only if the record exists and the field currently holds
    /// `expected` (`None`: the field must be missing).
    pub fn update_if_equals(
        &mut self,
        pk: &str,
        field: &str,
        expected: Option<&Value>,
        new_value: Value,
    ) -> Result<()> {
        let Some(record) = self.records.get_mut(pk) else {
            return Err(ModelError::ConditionFailed(pk.to_string()));
        };
        if record.get(field) != expected {
            return Err(ModelError::ConditionFailed(pk.to_string()));
        }
        record.set(field, new_value);
        Ok(())
    }

    pub fn delete(&mut self, pk: &str) -> bool {
        self.records.remove(pk).is_some()
    }

    /// All records ordered by `pk`.
    pub fn sorted_records(&self) -> Vec<Record> {
        let mut records: Vec<Record> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.pk().cmp(&b.pk()));
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_if_absent_conflicts_on_existing_key() {
        let mut table = Table::new();
        table.put_if_absent(Record::new("$next_group").with("n", "2")).unwrap();
        let err = table
            .put_if_absent(Record::new("$next_group").with("n", "9"))
            .unwrap_err();
        assert!(err.is_condition_failed());
        assert_eq!(
            table.get("$next_group").unwrap().get("n"),
            Some(&Value::from("2"))
        );
    }

    #[test]
    fn test_update_if_equals() {
        let mut table = Table::new();
        table.put(Record::new("k").with("n", "2")).unwrap();

        let stale = table.update_if_equals("k", "n", Some(&Value::from("1")), "3".into());
        assert!(stale.unwrap_err().is_condition_failed());

        table
            .update_if_equals("k", "n", Some(&Value::from("2")), "3".into())
            .unwrap();
        assert_eq!(table.get("k").unwrap().get("n"), Some(&Value::from("3")));

        table.update_if_equals("k", "other", None, "1".into()).unwrap();
        assert!(table
            .update_if_equals("missing", "n", None, "1".into())
            .unwrap_err()
            .is_condition_failed());
    }

    #[test]
    fn test_put_requires_pk() {
        let mut table = Table::new();
        assert!(matches!(
            table.put(Record::default()),
            Err(ModelError::Storage(_))
        ));
    }
}
