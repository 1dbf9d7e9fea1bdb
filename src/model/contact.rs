use lazy_static::lazy_static;
use regex::Regex;

use crate::core::{Fields, ModelError, Result};
use crate::entity::{Entity, EntityKind};
use crate::schema::SchemaBuilder;
use crate::storage::StoreClient;

pub const SUB: &str = "sub";
pub const CONTACT_ID: &str = "contact_id";

/// Fields a caller may change through the contact endpoint.
pub const ALLOWED_IN_CONTACT_UPDATE: &[&str] = &["name", "contact_info", "notes", "status"];

lazy_static! {
    static ref CONTACT_PK: Regex =
        Regex::new(r"^(\d+)-(c\d{4})$").expect("contact pk pattern must compile");
}

/// One contact owned by one user. `pk = "{sub}-{contact_id}"`.
pub struct ContactKind;

pub type Contact = Entity<ContactKind>;

impl EntityKind for ContactKind {
    const TYPE_NAME: &'static str = "Contact";

    fn define(schema: SchemaBuilder) -> SchemaBuilder {
        schema
            .identity(SUB)
            .identity(CONTACT_ID)
            .text("name", "")
            .text("contact_info", "")
            .text("notes", "")
            .text("status", "")
    }

    fn format_pk(identity: &Fields) -> Result<String> {
        Ok(format!(
            "{}-{}",
            identity.text(SUB)?,
            identity.text(CONTACT_ID)?
        ))
    }

    fn identity_from_pk(pk: &str) -> Result<Fields> {
        let captures = CONTACT_PK
            .captures(pk)
            .ok_or_else(|| ModelError::InvalidKey {
                entity: Self::TYPE_NAME.to_string(),
                pk: pk.to_string(),
            })?;
        Ok(Fields::new()
            .with(SUB, &captures[1])
            .with(CONTACT_ID, &captures[2]))
    }
}

impl Entity<ContactKind> {
    pub fn identity_of(sub: &str, contact_id: &str) -> Fields {
        Fields::new().with(SUB, sub).with(CONTACT_ID, contact_id)
    }

    pub async fn find(store: &StoreClient, sub: &str, contact_id: &str) -> Result<Self> {
        Self::read(store, Self::identity_of(sub, contact_id)).await
    }

    pub fn sub(&self) -> &str {
        self.text(SUB)
    }

    pub fn contact_id(&self) -> &str {
        self.text(CONTACT_ID)
    }

    pub fn name(&self) -> &str {
        self.text("name")
    }

    pub fn contact_info(&self) -> &str {
        self.text("contact_info")
    }

    pub fn notes(&self) -> &str {
        self.text("notes")
    }

    pub fn status(&self) -> &str {
        self.text("status")
    }
}
