//! Entity types of the tracker, built on [`crate::entity::Entity`].

pub mod admin;
pub mod contact;
pub mod group;
pub mod user;

pub use admin::AdminRegistry;
pub use contact::{Contact, ContactKind};
pub use group::{Assignment, Group, GroupKind};
pub use user::{User, UserKind};

use crate::core::Result;
use crate::entity::EntityKind;
use crate::schema::registered_entities;

/// Build every entity schema and return the registered type names.
pub fn register_all() -> Result<Vec<&'static str>> {
    UserKind::schema()?;
    ContactKind::schema()?;
    GroupKind::schema()?;
    registered_entities()
}
