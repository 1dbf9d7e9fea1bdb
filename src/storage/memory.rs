use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{KvStore, Table};
use crate::core::{Record, Result, Value};

pub struct InMemoryStore {
    table: RwLock<Table>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Table::new()),
        }
    }

    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Result<Self> {
        Ok(Self {
            table: RwLock::new(Table::from_records(records)?),
        })
    }

    /// Every record, ordered by `pk`. Tooling only; not part of `KvStore`.
    pub async fn scan(&self) -> Vec<Record> {
        self.table.read().await.sorted_records()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.read().await.is_empty()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for InMemoryStore {
    async fn get(&self, pk: &str) -> Result<Option<Record>> {
        Ok(self.table.read().await.get(pk).cloned())
    }

    async fn put(&self, record: Record) -> Result<()> {
        self.table.write().await.put(record)
    }

    async fn put_if_absent(&self, record: Record) -> Result<()> {
        self.table.write().await.put_if_absent(record)
    }

    async fn update_if_equals(
        &self,
        pk: &str,
        field: &str,
        expected: Option<&Value>,
        new_value: Value,
    ) -> Result<()> {
        self.table
            .write()
            .await
            .update_if_equals(pk, field, expected, new_value)
    }

    async fn delete(&self, pk: &str) -> Result<()> {
        self.table.write().await.delete(pk);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_point_operations() {
        let store = InMemoryStore::new();
        assert!(store.get("1_user").await.unwrap().is_none());

        store
            .put(Record::new("1_user").with("name", "Ann"))
            .await
            .unwrap();
        let record = store.get("1_user").await.unwrap().unwrap();
        assert_eq!(record.get("name"), Some(&Value::from("Ann")));

        store.delete("1_user").await.unwrap();
        store.delete("1_user").await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_scan_is_ordered_by_pk() {
        let store = InMemoryStore::with_records([
            Record::new("2_group"),
            Record::new("1_group"),
            Record::new("$admins"),
        ])
        .unwrap();
        let pks: Vec<String> = store
            .scan()
            .await
            .iter()
            .filter_map(|r| r.pk().map(str::to_string))
            .collect();
        assert_eq!(pks, vec!["$admins", "1_group", "2_group"]);
    }
}
