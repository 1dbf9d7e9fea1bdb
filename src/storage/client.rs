use std::sync::Arc;

use tracing::{debug, warn};

use super::{InMemoryStore, KvStore, counter};
use crate::core::{Record, Result};

/// Handle to the one logical table, passed explicitly to every entity
/// operation.
///
/// # Examples
///
/// ```
/// use kvmodel::{Record, StoreClient};
/// # tokio_test::block_on(async {
/// let client = StoreClient::in_memory();
/// client.write(Record::new("1_user").with("name", "Ann")).await?;
/// assert!(client.read("1_user").await?.is_some());
/// assert_eq!(client.atomic_increment("$next_group", "next_group_id", 1).await?, 1);
/// # Ok::<(), kvmodel::ModelError>(())
/// # }).unwrap();
/// ```
#[derive(Clone)]
pub struct StoreClient {
    store: Arc<dyn KvStore>,
    table_name: String,
}

impl StoreClient {
    pub fn new(store: Arc<dyn KvStore>, table_name: impl Into<String>) -> Self {
        Self {
            store,
            table_name: table_name.into(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()), "in-memory")
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// `None` when nothing (or an empty record) is stored under `pk`.
    pub async fn read(&self, pk: &str) -> Result<Option<Record>> {
        match self.store.get(pk).await {
            Ok(record) => {
                let record = record.filter(|r| !r.is_empty());
                debug!(
                    "{} read {} => {}",
                    self.table_name,
                    pk,
                    if record.is_some() { "found" } else { "Not found" }
                );
                Ok(record)
            }
            Err(err) => {
                warn!("Unable to read {} from {}: {}", pk, self.table_name, err);
                Err(err)
            }
        }
    }

    pub async fn write(&self, record: Record) -> Result<()> {
        let pk = record.require_pk()?.to_string();
        debug!("{} write {}", self.table_name, pk);
        self.store.put(record).await.inspect_err(|err| {
            warn!("Unable to write {} to {}: {}", pk, self.table_name, err);
        })
    }

    pub async fn delete(&self, pk: &str) -> Result<()> {
        debug!("{} delete {}", self.table_name, pk);
        self.store.delete(pk).await.inspect_err(|err| {
            warn!("Unable to delete {} from {}: {}", pk, self.table_name, err);
        })
    }

    /// See [`counter::atomic_increment`].
    pub async fn atomic_increment(&self, key: &str, field: &str, initial: i64) -> Result<i64> {
        counter::atomic_increment(self.store.as_ref(), key, field, initial)
            .await
            .inspect_err(|err| {
                warn!("Unable to increment {}#{} in {}: {}", key, field, self.table_name, err);
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ModelError, Value};
    use async_trait::async_trait;

    struct BrokenStore;

    #[async_trait]
    impl KvStore for BrokenStore {
        async fn get(&self, _pk: &str) -> Result<Option<Record>> {
            Err(ModelError::Storage("throttled".into()))
        }
        async fn put(&self, _record: Record) -> Result<()> {
            Err(ModelError::Storage("throttled".into()))
        }
        async fn put_if_absent(&self, _record: Record) -> Result<()> {
            Err(ModelError::Storage("throttled".into()))
        }
        async fn update_if_equals(
            &self,
            _pk: &str,
            _field: &str,
            _expected: Option<&Value>,
            _new_value: Value,
        ) -> Result<()> {
            Err(ModelError::Storage("throttled".into()))
        }
        async fn delete(&self, _pk: &str) -> Result<()> {
            Err(ModelError::Storage("throttled".into()))
        }
    }

    #[tokio::test]
    async fn test_store_failures_propagate_unchanged() {
        let client = StoreClient::new(Arc::new(BrokenStore), "broken");
        for err in [
            client.read("1_user").await.unwrap_err(),
            client.write(Record::new("1_user")).await.unwrap_err(),
            client.delete("1_user").await.unwrap_err(),
            client.atomic_increment("$next", "n", 1).await.unwrap_err(),
        ] {
            assert!(matches!(err, ModelError::Storage(ref m) if m == "throttled"));
        }
    }

    #[tokio::test]
    async fn test_write_requires_pk() {
        let client = StoreClient::in_memory();
        assert!(client.write(Record::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_record_reads_as_absent() {
        let store = Arc::new(InMemoryStore::new());
        let client = StoreClient::new(store, "t");
        client.write(Record::new("1_user")).await.unwrap();
        assert!(client.read("1_user").await.unwrap().is_some());
        assert!(client.read("2_user").await.unwrap().is_none());
    }
}
