/// Entity and domain model tests
///
/// End-to-end flows over the store backends
/// Run with: cargo test --test entity_model_tests

use kvmodel::handler::{RequestContext, error_response, restricted_update};
use kvmodel::model::contact::ALLOWED_IN_CONTACT_UPDATE;
use kvmodel::model::user::ALLOWED_IN_PROFILE_UPDATE;
use kvmodel::model::{AdminRegistry, Contact, Group, User};
use kvmodel::{
    DurabilityMode, ErrorClass, Fields, FileStore, ModelError, StoreClient, StoreConfig, Value,
    register_all,
};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_group_seven_store_record() {
    let store = StoreClient::in_memory();
    let mut group = Group::new(Group::identity_of(7)).unwrap();
    group.write(&store).await.unwrap();

    let record = store.read("7_group").await.unwrap().unwrap();
    assert_eq!(record.len(), 5);
    assert_eq!(record.get("members"), Some(&Value::List(vec![])));
    assert_eq!(record.get("deactivated_at"), Some(&Value::from("0")));
    assert!(matches!(record.get("created_at"), Some(Value::Text(_))));
    assert!(matches!(record.get("modified_at"), Some(Value::Text(_))));

    let external = group.to_external();
    assert_eq!(external["group_id"], json!(7));
    assert_eq!(external["deactivated_at"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_entities_survive_file_store_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new("JSC-Tracker")
        .data_dir(dir.path())
        .durability(DurabilityMode::Sync);

    let mut user = User::create("1001", "ann@example.com").unwrap();
    {
        let store = config.open().unwrap();
        user.write(&store).await.unwrap();
        user.add_contact(&store, Fields::new().with("name", "Recruiter"))
            .await
            .unwrap();
        let mut group = Group::create(&store).await.unwrap();
        group.add_member(user.sub()).unwrap();
        group.write(&store).await.unwrap();
    }

    let store = config.open().unwrap();
    let loaded = User::find(&store, "1001").await.unwrap();
    assert_eq!(loaded, user);
    assert_eq!(loaded.next_contact_id(), "c0002");
    let contact = Contact::find(&store, "1001", "c0001").await.unwrap();
    assert_eq!(contact.name(), "Recruiter");
    assert_eq!(Group::find(&store, 1).await.unwrap().members(), vec!["1001"]);
    assert_eq!(Group::create(&store).await.unwrap().group_id(), 2);
}

#[tokio::test]
async fn test_scan_rehydrates_only_matching_types() {
    let dir = tempfile::tempdir().unwrap();
    let file_store = Arc::new(FileStore::open(dir.path(), DurabilityMode::Async).unwrap());
    let store = StoreClient::new(file_store.clone(), "scan");

    let mut user = User::create("5", "five@example.com").unwrap();
    user.write(&store).await.unwrap();
    user.add_contact(&store, Fields::new()).await.unwrap();
    Group::create(&store).await.unwrap();
    AdminRegistry::new(store.clone()).grant("5").await.unwrap();

    let records = file_store.scan().await;
    assert_eq!(records.len(), 5);

    let users: Vec<User> = records
        .iter()
        .filter_map(|r| User::from_scanned_record(r).unwrap())
        .collect();
    let contacts: Vec<Contact> = records
        .iter()
        .filter_map(|r| Contact::from_scanned_record(r).unwrap())
        .collect();
    let groups: Vec<Group> = records
        .iter()
        .filter_map(|r| Group::from_scanned_record(r).unwrap())
        .collect();
    assert_eq!(users.len(), 1);
    assert_eq!(contacts.len(), 1);
    assert_eq!(groups.len(), 1);
    assert_eq!(contacts[0].pk(), "5-c0001");
}

#[tokio::test]
async fn test_assign_users_moves_between_groups() {
    let store = StoreClient::in_memory();
    for sub in ["1", "2"] {
        User::create(sub, "x@example.com")
            .unwrap()
            .write(&store)
            .await
            .unwrap();
    }
    let first = Group::create(&store).await.unwrap();
    let second = Group::create(&store).await.unwrap();

    let subs = vec!["1".to_string(), "2".to_string()];
    let outcome = Group::assign_users(&store, first.group_id(), &subs).await.unwrap();
    assert_eq!(outcome.assigned_users, subs);
    assert_eq!(outcome.previously_unassigned, subs);
    assert_eq!(Group::find(&store, 1).await.unwrap().members(), vec!["2", "1"]);

    let moved = Group::assign_users(&store, second.group_id(), &subs[..1]).await.unwrap();
    assert!(moved.previously_unassigned.is_empty());
    assert_eq!(Group::find(&store, 1).await.unwrap().members(), vec!["2"]);
    assert_eq!(Group::find(&store, 2).await.unwrap().members(), vec!["1"]);
    assert_eq!(User::find(&store, "1").await.unwrap().group_id(), Some(2));

    let again = Group::assign_users(&store, 2, &subs[..1]).await.unwrap();
    assert!(again.assigned_users.is_empty());
}

#[tokio::test]
async fn test_assign_users_checks_everything_first() {
    let store = StoreClient::in_memory();
    User::create("1", "x@example.com")
        .unwrap()
        .write(&store)
        .await
        .unwrap();
    Group::create(&store).await.unwrap();

    let subs = vec!["1".to_string(), "404".to_string()];
    let err = Group::assign_users(&store, 1, &subs).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::NotFound);
    assert!(User::find(&store, "1").await.unwrap().is_unassigned());
    assert!(Group::find(&store, 1).await.unwrap().members().is_empty());

    let err = Group::assign_users(&store, 9, &subs[..1]).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(
        Group::assign_users(&store, 1, &[]).await,
        Err(ModelError::Validation(_))
    ));
}

#[tokio::test]
async fn test_contact_update_flow() {
    let store = StoreClient::in_memory();
    let mut user = User::create("77", "u@example.com").unwrap();
    user.write(&store).await.unwrap();
    user.add_contact(&store, Fields::new()).await.unwrap();

    let body = json!({"notes": "https://notes.test/", "status": "called", "contact_id": "c9999"});
    let ctx = RequestContext::new(Some("77".to_string()))
        .with_param("user_id", "-")
        .with_param("contact_id", "c0001")
        .with_body(body.as_object().cloned().unwrap());

    let sub = ctx.user_id("user_id").unwrap();
    let mut contact = Contact::find(&store, sub, ctx.param("contact_id").unwrap())
        .await
        .unwrap();
    let accepted = restricted_update(&mut contact, &ctx.body, ALLOWED_IN_CONTACT_UPDATE).unwrap();
    contact.write(&store).await.unwrap();

    assert_eq!(accepted.len(), 2);
    let stored = Contact::find(&store, "77", "c0001").await.unwrap();
    assert_eq!(stored.notes(), "https://notes.test/");
    assert_eq!(stored.status(), "called");
    assert_eq!(stored.contact_id(), "c0001");
}

#[tokio::test]
async fn test_profile_update_and_missing_user() {
    let store = StoreClient::in_memory();
    let mut user = User::create("3", "three@example.com").unwrap();
    user.write(&store).await.unwrap();

    let body = json!({"twopager": "  https://doc.test/  ", "email": "evil@example.com"});
    restricted_update(&mut user, body.as_object().unwrap(), ALLOWED_IN_PROFILE_UPDATE).unwrap();
    user.write(&store).await.unwrap();

    let record = store.read("3_user").await.unwrap().unwrap();
    assert_eq!(record.get("twopager"), Some(&Value::from("https://doc.test/")));
    assert_eq!(record.get("email"), Some(&Value::from("three@example.com")));

    let err = User::find(&store, "4").await.unwrap_err();
    let (status, body) = error_response(&err);
    assert_eq!(status, 404);
    assert!(body["error"].as_str().unwrap().contains("4_user"));
    assert!(User::find_optional(&store, "4").await.unwrap().is_none());
}

#[tokio::test]
async fn test_soft_delete_round_trip() {
    let store = StoreClient::in_memory();
    let mut contact = Contact::new(Contact::identity_of("8", "c0001")).unwrap();
    contact.deactivate().unwrap();
    contact.write(&store).await.unwrap();

    let mut loaded = Contact::find(&store, "8", "c0001").await.unwrap();
    assert!(!loaded.is_active());
    loaded.reactivate().unwrap();
    loaded.write(&store).await.unwrap();
    assert!(Contact::find(&store, "8", "c0001").await.unwrap().is_active());
}

#[test]
fn test_registered_entities() {
    let names = register_all().unwrap();
    for expected in ["Contact", "Group", "User"] {
        assert!(names.contains(&expected), "{expected} missing from {names:?}");
    }
}
