//! The narrow surface the request-routing layer talks to.

use std::collections::BTreeMap;

use serde_json::{Map, json};
use tracing::debug;

use crate::core::{ModelError, Result};
use crate::entity::{Entity, EntityKind};

pub type JsonObject = Map<String, serde_json::Value>;

/// Path parameter value meaning "the caller".
pub const SELF_PARAM: &str = "-";

/// What a routed request hands to the model layer.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Verified identity of the caller, if any.
    pub caller: Option<String>,
    pub body: JsonObject,
    pub params: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn new(caller: Option<String>) -> Self {
        Self {
            caller,
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: JsonObject) -> Self {
        self.body = body;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn param(&self, name: &str) -> Result<&str> {
        self.params
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ModelError::Validation(format!("{} is required", name)))
    }

    /// A user-id path parameter, where `-` stands for the caller.
    pub fn user_id(&self, name: &str) -> Result<&str> {
        match self.param(name)? {
            SELF_PARAM => self
                .caller
                .as_deref()
                .ok_or_else(|| ModelError::Validation("No caller for '-'".to_string())),
            other => Ok(other),
        }
    }
}

/// Apply the allowed subset of `body` to `entity` and return that subset.
/// Keys outside `allowed` are dropped before anything is parsed.
pub fn restricted_update<K: EntityKind>(
    entity: &mut Entity<K>,
    body: &JsonObject,
    allowed: &[&str],
) -> Result<JsonObject> {
    let accepted: JsonObject = body
        .iter()
        .filter(|(name, _)| allowed.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    if accepted.len() < body.len() {
        debug!("{} dropped {} disallowed field(s)", entity, body.len() - accepted.len());
    }
    let fields = Entity::<K>::fields_from_external(&accepted)?;
    entity.update(&fields)?;
    Ok(accepted)
}

/// Status code and JSON body for a failed request.
pub fn error_response(err: &ModelError) -> (u16, serde_json::Value) {
    (err.class().http_status(), json!({ "error": err.to_string() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::contact::ALLOWED_IN_CONTACT_UPDATE;
    use crate::model::{Contact, User};

    fn object(value: serde_json::Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_restricted_update_filters_body() {
        let mut contact = Contact::new(Contact::identity_of("1", "c0001")).unwrap();
        let body = object(json!({"notes": "https://x.test/", "sub": "2", "pk": "evil"}));
        let accepted = restricted_update(&mut contact, &body, ALLOWED_IN_CONTACT_UPDATE).unwrap();

        assert_eq!(accepted, object(json!({"notes": "https://x.test/"})));
        assert_eq!(contact.notes(), "https://x.test/");
        assert_eq!(contact.sub(), "1");
        assert_eq!(contact.pk(), "1-c0001");
    }

    #[test]
    fn test_restricted_update_keeps_email() {
        let mut user = User::create("9", "nine@example.com").unwrap();
        let body = object(json!({"name": "Nine", "email": "other@example.com"}));
        restricted_update(&mut user, &body, crate::model::user::ALLOWED_IN_PROFILE_UPDATE).unwrap();
        assert_eq!(user.name(), "Nine");
        assert_eq!(user.email(), "nine@example.com");
    }

    #[test]
    fn test_user_id_param_resolves_self() {
        let ctx = RequestContext::new(Some("42".to_string()))
            .with_param("user_id", SELF_PARAM)
            .with_param("contact_id", "c0001");
        assert_eq!(ctx.user_id("user_id").unwrap(), "42");
        assert_eq!(ctx.param("contact_id").unwrap(), "c0001");
        assert!(ctx.param("missing").is_err());

        let anonymous = RequestContext::new(None).with_param("user_id", SELF_PARAM);
        assert!(anonymous.user_id("user_id").is_err());
    }

    #[test]
    fn test_error_response_classes() {
        let (status, body) = error_response(&ModelError::NotFound("User 1".to_string()));
        assert_eq!(status, 404);
        assert_eq!(body["error"], json!("Not found: User 1"));

        let (status, _) = error_response(&ModelError::Validation("bad".to_string()));
        assert_eq!(status, 400);
        let (status, _) = error_response(&ModelError::Storage("down".to_string()));
        assert_eq!(status, 500);
    }
}
