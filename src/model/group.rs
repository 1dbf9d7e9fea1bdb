use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use super::user::User;
use crate::core::{Fields, ModelError, Result};
use crate::entity::{Entity, EntityKind};
use crate::schema::SchemaBuilder;
use crate::storage::StoreClient;

pub const GROUP_ID: &str = "group_id";
pub const MEMBERS: &str = "members";

/// Counter record minting group numbers.
pub const NEXT_GROUP_PK: &str = "$next_group";
pub const NEXT_GROUP_FIELD: &str = "next_group_id";

lazy_static! {
    static ref GROUP_PK: Regex = Regex::new(r"^(\d+)_group$").expect("group pk pattern must compile");
}

/// A numbered group with an ordered member list (most recent first).
pub struct GroupKind;

pub type Group = Entity<GroupKind>;

impl EntityKind for GroupKind {
    const TYPE_NAME: &'static str = "Group";

    fn define(schema: SchemaBuilder) -> SchemaBuilder {
        schema.identity(GROUP_ID).id_list(MEMBERS)
    }

    fn format_pk(identity: &Fields) -> Result<String> {
        Ok(format!("{}_group", identity.integer(GROUP_ID)?))
    }

    fn identity_from_pk(pk: &str) -> Result<Fields> {
        let invalid = || ModelError::InvalidKey {
            entity: Self::TYPE_NAME.to_string(),
            pk: pk.to_string(),
        };
        let captures = GROUP_PK.captures(pk).ok_or_else(invalid)?;
        let group_id: i64 = captures[1].parse().map_err(|_| invalid())?;
        Ok(Fields::new().with(GROUP_ID, group_id))
    }
}

/// Outcome of [`Group::assign_users`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub group_id: i64,
    pub assigned_users: Vec<String>,
    pub previously_unassigned: Vec<String>,
}

impl Entity<GroupKind> {
    pub fn identity_of(group_id: i64) -> Fields {
        Fields::new().with(GROUP_ID, group_id)
    }

    pub async fn find(store: &StoreClient, group_id: i64) -> Result<Self> {
        Self::read(store, Self::identity_of(group_id)).await
    }

    /// Mint the next group number and write an empty group under it.
    pub async fn create(store: &StoreClient) -> Result<Self> {
        let group_id = store
            .atomic_increment(NEXT_GROUP_PK, NEXT_GROUP_FIELD, 1)
            .await?;
        let mut group = Self::new(Self::identity_of(group_id))?;
        group.write(store).await?;
        Ok(group)
    }

    pub fn group_id(&self) -> i64 {
        self.value(GROUP_ID).as_i64().unwrap_or_default()
    }

    pub fn members(&self) -> Vec<&str> {
        self.ids(MEMBERS)
    }

    pub fn has_member(&self, sub: &str) -> bool {
        self.members().contains(&sub)
    }

    /// Put a new member at the front. Existing members keep their place.
    pub fn add_member(&mut self, sub: &str) -> Result<bool> {
        if self.has_member(sub) {
            return Ok(false);
        }
        self.prepend_id(MEMBERS, sub)
    }

    pub fn remove_member(&mut self, sub: &str) -> Result<bool> {
        self.remove_id(MEMBERS, sub)
    }

    /// Move each user into group `group_id`. Every user is loaded before
    /// anything changes; users already in the group are skipped. Each
    /// modified user and group is written once.
    pub async fn assign_users(store: &StoreClient, group_id: i64, subs: &[String]) -> Result<Assignment> {
        if subs.is_empty() {
            return Err(ModelError::Validation(
                "user_subs is required and must be a non-empty list".to_string(),
            ));
        }
        if group_id < 1 {
            return Err(ModelError::Validation(format!("Invalid group number: {}", group_id)));
        }

        let mut groups: HashMap<i64, Group> = HashMap::new();
        groups.insert(group_id, Self::find(store, group_id).await?);

        let mut users = Vec::new();
        for sub in subs {
            let user = User::find(store, sub).await?;
            if user.group_id() != Some(group_id) {
                users.push(user);
            }
        }

        let mut modified_groups = Vec::new();
        let mut previously_unassigned = Vec::new();
        let mut assigned_users = Vec::new();
        for mut user in users {
            match user.group_id() {
                None => previously_unassigned.push(user.sub().to_string()),
                Some(previous) => {
                    if !groups.contains_key(&previous) {
                        if let Some(group) = Self::read_optional(store, Self::identity_of(previous)).await? {
                            groups.insert(previous, group);
                        }
                    }
                    if let Some(group) = groups.get_mut(&previous) {
                        if group.remove_member(user.sub())? {
                            modified_groups.push(previous);
                        }
                    }
                }
            }

            user.assign_to_group(group_id)?;
            if let Some(target) = groups.get_mut(&group_id) {
                if target.add_member(user.sub())? {
                    modified_groups.push(group_id);
                }
            }
            user.write(store).await?;
            assigned_users.push(user.sub().to_string());
        }

        modified_groups.sort_unstable();
        modified_groups.dedup();
        for id in modified_groups {
            if let Some(group) = groups.get_mut(&id) {
                group.write(store).await?;
            }
        }

        if !previously_unassigned.is_empty() {
            debug!("Users previously unassigned: {}", previously_unassigned.join(", "));
        }

        Ok(Assignment {
            group_id,
            assigned_users,
            previously_unassigned,
        })
    }
}
