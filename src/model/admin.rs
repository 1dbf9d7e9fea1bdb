use tracing::debug;

use super::user::User;
use crate::core::{ModelError, Record, Result, Value};
use crate::storage::StoreClient;

pub const ADMINS_PK: &str = "$admins";
pub const ADMIN_IDS_FIELD: &str = "user_id_list";

/// The admin list, kept as an ordered id list in the `$admins` record.
#[derive(Clone)]
pub struct AdminRegistry {
    store: StoreClient,
}

impl AdminRegistry {
    pub fn new(store: StoreClient) -> Self {
        Self { store }
    }

    /// Admin subs, most recently granted first. Empty when the record is absent.
    pub async fn admin_user_ids(&self) -> Result<Vec<String>> {
        let Some(record) = self.store.read(ADMINS_PK).await? else {
            return Ok(Vec::new());
        };
        match record.get(ADMIN_IDS_FIELD) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => value
                .as_text_list()
                .map(|ids| ids.into_iter().map(str::to_string).collect())
                .ok_or_else(|| {
                    ModelError::Corrupt(format!("{}#{} is not a list of ids", ADMINS_PK, ADMIN_IDS_FIELD))
                }),
        }
    }

    /// Admins that still have a user record.
    pub async fn admin_users(&self) -> Result<Vec<User>> {
        let mut users = Vec::new();
        for sub in self.admin_user_ids().await? {
            if let Some(user) = User::find_optional(&self.store, &sub).await? {
                users.push(user);
            }
        }
        Ok(users)
    }

    pub async fn is_admin(&self, sub: &str) -> Result<bool> {
        Ok(self.admin_user_ids().await?.iter().any(|id| id == sub))
    }

    /// Put `sub` at the front of the list. Returns `false` if already an admin.
    pub async fn grant(&self, sub: &str) -> Result<bool> {
        let mut ids = self.admin_user_ids().await?;
        if ids.iter().any(|id| id == sub) {
            return Ok(false);
        }
        ids.insert(0, sub.to_string());
        debug!("Granting admin to {}", sub);
        self.write_ids(ids).await?;
        Ok(true)
    }

    pub async fn revoke(&self, sub: &str) -> Result<bool> {
        let mut ids = self.admin_user_ids().await?;
        let before = ids.len();
        ids.retain(|id| id != sub);
        if ids.len() == before {
            return Ok(false);
        }
        debug!("Revoking admin from {}", sub);
        self.write_ids(ids).await?;
        Ok(true)
    }

    async fn write_ids(&self, ids: Vec<String>) -> Result<()> {
        self.store
            .write(Record::new(ADMINS_PK).with(ADMIN_IDS_FIELD, ids))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_grant_and_revoke() {
        let registry = AdminRegistry::new(StoreClient::in_memory());
        assert!(registry.admin_user_ids().await.unwrap().is_empty());

        assert!(registry.grant("1").await.unwrap());
        assert!(registry.grant("2").await.unwrap());
        assert!(!registry.grant("1").await.unwrap());
        assert_eq!(registry.admin_user_ids().await.unwrap(), vec!["2", "1"]);
        assert!(registry.is_admin("1").await.unwrap());

        assert!(registry.revoke("1").await.unwrap());
        assert!(!registry.revoke("1").await.unwrap());
        assert!(!registry.is_admin("1").await.unwrap());
    }

    #[tokio::test]
    async fn test_admin_users_skips_missing_records() {
        let store = StoreClient::in_memory();
        let mut user = User::create("7", "seven@example.com").unwrap();
        user.write(&store).await.unwrap();

        let registry = AdminRegistry::new(store);
        registry.grant("7").await.unwrap();
        registry.grant("8").await.unwrap();
        let admins = registry.admin_users().await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].sub(), "7");
    }

    #[tokio::test]
    async fn test_corrupt_admin_list() {
        let store = StoreClient::in_memory();
        store
            .write(Record::new(ADMINS_PK).with(ADMIN_IDS_FIELD, 3))
            .await
            .unwrap();
        let err = AdminRegistry::new(store).admin_user_ids().await.unwrap_err();
        assert!(matches!(err, ModelError::Corrupt(_)));
    }
}
