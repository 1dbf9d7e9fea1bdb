use async_trait::async_trait;

use crate::core::{Record, Result, Value};

/// Storage engine trait - single-table point operations plus the two
/// conditional writes the counter needs.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read the record stored under `pk`
    async fn get(&self, pk: &str) -> Result<Option<Record>>;

    /// Unconditionally replace the record under its `pk`
    async fn put(&self, record: Record) -> Result<()>;

    /// Insert the record only if nothing is stored under its `pk`.
    /// Fails with `ConditionFailed` otherwise.
    async fn put_if_absent(&self, record: Record) -> Result<()>;

    /// Set one attribute only if it still holds `expected` (`None`: still
    /// missing). Fails with `ConditionFailed` otherwise.
    async fn update_if_equals(
        &self,
        pk: &str,
        field: &str,
        expected: Option<&Value>,
        new_value: Value,
    ) -> Result<()>;

    /// Remove the record; removing a missing key is not an error
    async fn delete(&self, pk: &str) -> Result<()>;
}
