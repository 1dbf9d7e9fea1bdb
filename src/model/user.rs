use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::debug;

use super::contact::Contact;
use crate::core::{Fields, ModelError, Result, Value, now};
use crate::entity::{Entity, EntityKind};
use crate::schema::{FieldDescriptor, SchemaBuilder};
use crate::storage::{StoreClient, successor};

pub const SUB: &str = "sub";
pub const GROUP: &str = "group";
pub const CONTACT_ID_SET: &str = "contact_id_set";
pub const ARCHIVED_CONTACT_ID_SET: &str = "archived_contact_id_set";
pub const NEXT_CONTACT_ID: &str = "next_contact_id";
pub const LOGIN_EXPIRES_AT: &str = "login_expires_at";

/// Stored in `group` while the user belongs to no group.
pub const UNASSIGNED_GROUP: &str = "-1";

/// Fields a caller may change through the profile endpoint. `email` is not
/// among them.
pub const ALLOWED_IN_PROFILE_UPDATE: &[&str] = &["name", "slack_profile", "twopager", "cmf"];

const USER_SUFFIX: &str = "_user";

/// A signed-in person, keyed by the identity provider's `sub`.
pub struct UserKind;

pub type User = Entity<UserKind>;

impl EntityKind for UserKind {
    const TYPE_NAME: &'static str = "User";

    fn define(schema: SchemaBuilder) -> SchemaBuilder {
        schema
            .identity(SUB)
            .text("name", "Tyl Pherry")
            .text("email", "me@here.com")
            .text("slack_profile", "Slack profile URL")
            .text("twopager", "Two-pager URL")
            .text("cmf", "Candidate-Market Fit goes here")
            .text("contact_info", "Contact Info goes here")
            .descriptor(
                FieldDescriptor::plain(GROUP)
                    .default_value_of(UNASSIGNED_GROUP)
                    .to_external_with(|v| match v.as_str() {
                        Some(UNASSIGNED_GROUP) => serde_json::Value::Null,
                        _ => v.to_json(),
                    }),
            )
            .field(CONTACT_ID_SET, || Value::StringSet(BTreeSet::new()))
            .field(ARCHIVED_CONTACT_ID_SET, || Value::StringSet(BTreeSet::new()))
            .text(NEXT_CONTACT_ID, "c0001")
            .timestamp(LOGIN_EXPIRES_AT)
    }

    fn format_pk(identity: &Fields) -> Result<String> {
        Ok(format!("{}{}", identity.text(SUB)?, USER_SUFFIX))
    }

    fn identity_from_pk(pk: &str) -> Result<Fields> {
        match pk.strip_suffix(USER_SUFFIX) {
            Some(sub) if !sub.is_empty() => Ok(Fields::new().with(SUB, sub)),
            _ => Err(ModelError::InvalidKey {
                entity: Self::TYPE_NAME.to_string(),
                pk: pk.to_string(),
            }),
        }
    }

    fn after_load(user: &mut User) -> Result<()> {
        if user.login_expires_at().is_some_and(|t| t < now()) {
            debug!("{} login expired", user);
            user.set(LOGIN_EXPIRES_AT, Value::Null)?;
        }
        Ok(())
    }
}

impl Entity<UserKind> {
    pub fn identity_of(sub: &str) -> Fields {
        Fields::new().with(SUB, sub)
    }

    /// A fresh user with only the bare minimum supplied.
    pub fn create(sub: &str, email: &str) -> Result<Self> {
        Self::new(Self::identity_of(sub).with("email", email))
    }

    pub async fn find(store: &StoreClient, sub: &str) -> Result<Self> {
        Self::read(store, Self::identity_of(sub)).await
    }

    pub async fn find_optional(store: &StoreClient, sub: &str) -> Result<Option<Self>> {
        Self::read_optional(store, Self::identity_of(sub)).await
    }

    pub fn sub(&self) -> &str {
        self.text(SUB)
    }

    pub fn name(&self) -> &str {
        self.text("name")
    }

    pub fn email(&self) -> &str {
        self.text("email")
    }

    pub fn group(&self) -> &str {
        self.text(GROUP)
    }

    /// The assigned group number, `None` while unassigned.
    pub fn group_id(&self) -> Option<i64> {
        match self.group() {
            UNASSIGNED_GROUP => None,
            other => other.parse().ok(),
        }
    }

    pub fn is_unassigned(&self) -> bool {
        self.group() == UNASSIGNED_GROUP
    }

    pub fn login_expires_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp(LOGIN_EXPIRES_AT)
    }

    pub fn next_contact_id(&self) -> &str {
        self.text(NEXT_CONTACT_ID)
    }

    pub fn contact_ids(&self) -> BTreeSet<String> {
        self.string_set(CONTACT_ID_SET).cloned().unwrap_or_default()
    }

    pub fn archived_contact_ids(&self) -> BTreeSet<String> {
        self.string_set(ARCHIVED_CONTACT_ID_SET)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns whether the assignment changed.
    pub fn assign_to_group(&mut self, group_id: i64) -> Result<bool> {
        let group = group_id.to_string();
        if self.group() == group {
            return Ok(false);
        }
        self.set(GROUP, group)?;
        Ok(true)
    }

    pub fn unassign(&mut self) -> Result<bool> {
        if self.is_unassigned() {
            return Ok(false);
        }
        self.set(GROUP, UNASSIGNED_GROUP)?;
        Ok(true)
    }

    /// Create a contact under the next contact id, then write both the
    /// contact and this user.
    pub async fn add_contact(&mut self, store: &StoreClient, fields: Fields) -> Result<Contact> {
        let contact_id = self.next_contact_id().to_string();
        // Identity always comes from this user, whatever the caller passed.
        let mut args = fields;
        args.merge(Contact::identity_of(self.sub(), &contact_id));

        let mut contact = Contact::new(args)?;
        contact.write(store).await?;

        self.insert_into_set(CONTACT_ID_SET, &contact_id)?;
        self.set(NEXT_CONTACT_ID, successor(&contact_id))?;
        self.write(store).await?;
        Ok(contact)
    }

    /// Move a contact id from the active set to the archived set and write
    /// the user. The contact record itself is left alone.
    pub async fn archive_contact(&mut self, store: &StoreClient, contact_id: &str) -> Result<bool> {
        if !self.remove_from_set(CONTACT_ID_SET, contact_id)? {
            return Ok(false);
        }
        self.insert_into_set(ARCHIVED_CONTACT_ID_SET, contact_id)?;
        self.write(store).await?;
        Ok(true)
    }

    /// Summary used by admin listings.
    pub fn to_summary(&self) -> serde_json::Value {
        json!({
            "sub": self.sub(),
            "name": self.name(),
            "email": self.email(),
            "group": self.group_id(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::timestamp_from_secs;
    use chrono::Duration;

    #[test]
    fn test_user_defaults() {
        let user = User::create("115", "ann@example.com").unwrap();
        assert_eq!(user.pk(), "115_user");
        assert_eq!(user.email(), "ann@example.com");
        assert_eq!(user.next_contact_id(), "c0001");
        assert!(user.is_unassigned());
        assert!(user.contact_ids().is_empty());
        assert_eq!(user.to_external()["group"], serde_json::Value::Null);
    }

    #[test]
    fn test_user_pk_inverse() {
        assert_eq!(
            UserKind::identity_from_pk("115_user").unwrap().text(SUB).unwrap(),
            "115"
        );
        assert!(UserKind::identity_from_pk("_user").is_err());
        assert!(UserKind::identity_from_pk("$admins").is_err());
    }

    #[test]
    fn test_assign_to_group() {
        let mut user = User::create("115", "a@b.c").unwrap();
        assert!(user.assign_to_group(3).unwrap());
        assert!(!user.assign_to_group(3).unwrap());
        assert_eq!(user.group_id(), Some(3));
        assert_eq!(user.to_external()["group"], json!("3"));
        assert!(user.unassign().unwrap());
        assert!(user.is_unassigned());
    }

    #[test]
    fn test_after_load_clears_expired_login() {
        let mut user = User::create("115", "a@b.c").unwrap();
        let past = now() - Duration::hours(1);
        user.set(LOGIN_EXPIRES_AT, past).unwrap();
        let loaded = User::from_store_record(Some(user.to_store_record()), Fields::new())
            .unwrap()
            .unwrap();
        assert_eq!(loaded.login_expires_at(), None);

        let future = timestamp_from_secs(now().timestamp() + 3600).unwrap();
        user.set(LOGIN_EXPIRES_AT, future).unwrap();
        let loaded = User::from_store_record(Some(user.to_store_record()), Fields::new())
            .unwrap()
            .unwrap();
        assert_eq!(loaded.login_expires_at(), Some(future));
    }

    #[tokio::test]
    async fn test_add_and_archive_contact() {
        let store = StoreClient::in_memory();
        let mut user = User::create("115", "a@b.c").unwrap();
        user.write(&store).await.unwrap();

        let first = user
            .add_contact(&store, Fields::new().with("name", "Bo"))
            .await
            .unwrap();
        let second = user.add_contact(&store, Fields::new()).await.unwrap();
        assert_eq!(first.contact_id(), "c0001");
        assert_eq!(second.contact_id(), "c0002");
        assert_eq!(user.next_contact_id(), "c0003");

        let stored = User::find(&store, "115").await.unwrap();
        assert_eq!(stored, user);
        assert_eq!(
            Contact::find(&store, "115", "c0001").await.unwrap().name(),
            "Bo"
        );

        assert!(user.archive_contact(&store, "c0001").await.unwrap());
        assert!(!user.archive_contact(&store, "c0001").await.unwrap());
        let stored = User::find(&store, "115").await.unwrap();
        assert_eq!(stored.contact_ids(), BTreeSet::from(["c0002".to_string()]));
        assert_eq!(
            stored.archived_contact_ids(),
            BTreeSet::from(["c0001".to_string()])
        );
    }

    #[tokio::test]
    async fn test_add_contact_ignores_caller_identity() {
        let store = StoreClient::in_memory();
        let mut user = User::create("115", "a@b.c").unwrap();
        user.write(&store).await.unwrap();

        let fields = Fields::new()
            .with("sub", "999")
            .with("contact_id", "c0042")
            .with("name", "Bo");
        let contact = user.add_contact(&store, fields).await.unwrap();
        assert_eq!(contact.pk(), "115-c0001");
        assert_eq!(contact.sub(), "115");
        assert_eq!(contact.name(), "Bo");

        assert!(Contact::find(&store, "115", "c0001").await.is_ok());
        assert!(store.read("999-c0001").await.unwrap().is_none());
        assert!(store.read("115-c0042").await.unwrap().is_none());
        assert_eq!(user.next_contact_id(), "c0002");
    }
}
