//! Tests for secret handling through the engine

use pretty_assertions::assert_eq;
use restsync_core::Error;
use restsync_resource::Resource;
use restsync_test_utils::CallKind;
use restsync_test_utils::fixtures::{Harness, open_store};
use serde_json::json;
use tempfile::TempDir;

#[test]
fn test_placeholders_are_resolved_before_sending() {
    let dir = TempDir::new().unwrap();
    let h = Harness::teams().with_secret_store(open_store(&dir));
    h.engine.set_secret("/teams/team-a", "token", "s3cr3t").unwrap();

    let stored = Resource::new(json!({"name": "team-a", "token": "{{secret .}}"}));
    h.engine.save_remote_resource("/teams/team-a", &stored).unwrap();

    let create = h
        .server
        .calls()
        .into_iter()
        .find(|c| c.kind == CallKind::Create)
        .unwrap();
    assert_eq!(create.body, Some(json!({"name": "team-a", "token": "s3cr3t"})));
}

#[test]
fn test_placeholder_without_store_is_not_sent() {
    let h = Harness::teams();
    let stored = Resource::new(json!({"name": "team-a", "token": "{{secret .}}"}));

    let err = h
        .engine
        .save_remote_resource("/teams/team-a", &stored)
        .unwrap_err();
    assert!(err.is_not_configured());
    assert_eq!(h.server.count(CallKind::Create), 0);
    assert_eq!(h.server.count(CallKind::Update), 0);
}

#[test]
fn test_mask_persist_then_resolve() {
    let dir = TempDir::new().unwrap();
    let h = Harness::teams().with_secret_store(open_store(&dir));
    let plain = Resource::new(json!({"name": "team-a", "token": "abc"}));

    let masked = h
        .engine
        .mask_resource_secrets("/teams/team-a", &plain, true)
        .unwrap();
    assert_eq!(masked.value(), &json!({"name": "team-a", "token": "{{secret .}}"}));
    assert_eq!(h.engine.get_secret("/teams/team-a", "token").unwrap(), "abc");
    assert_eq!(h.engine.list_secret_keys("/teams/team-a").unwrap(), vec!["token"]);
    assert_eq!(h.engine.list_secret_resources().unwrap(), vec!["/teams/team-a"]);

    let resolved = h
        .engine
        .resolve_resource_secrets("/teams/team-a", &masked)
        .unwrap();
    assert_eq!(resolved, plain);

    h.engine.delete_secret("/teams/team-a", "token").unwrap();
    assert!(h.engine.list_secret_resources().unwrap().is_empty());
}

#[test]
fn test_mask_persist_on_array_is_rejected() {
    let dir = TempDir::new().unwrap();
    let h = Harness::teams().with_secret_store(open_store(&dir));
    let teams = Resource::new(json!([{"name": "a", "token": "x"}, {"name": "b", "token": "y"}]));

    let err = h
        .engine
        .mask_resource_secrets("/teams/", &teams, true)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Secrets(restsync_secrets::Error::CollectionSecrets { .. })
    ));
    assert!(h.engine.list_secret_resources().unwrap().is_empty());
}

#[test]
fn test_mask_without_persist_needs_no_store() {
    let h = Harness::teams();
    let masked = h
        .engine
        .mask_resource_secrets("/teams/a", &Resource::new(json!({"token": 42})), false)
        .unwrap();
    assert_eq!(masked.value(), &json!({"token": "{{secret .}}"}));
}

#[test]
fn test_secret_paths_for() {
    let h = Harness::teams();
    assert_eq!(h.engine.secret_paths_for("/teams/a").unwrap(), vec!["token"]);
    assert_eq!(h.engine.secret_paths_for("/teams/").unwrap(), vec!["token"]);
    assert!(h.engine.secret_paths_for("/teams/a/members/b").unwrap().is_empty());
    assert!(h.engine.secret_paths_for("/other").unwrap().is_empty());
}

#[test]
fn test_secret_operations_without_store() {
    let h = Harness::teams();
    assert!(h.engine.get_secret("/a", "k").unwrap_err().is_not_configured());
    assert!(h.engine.set_secret("/a", "k", "v").unwrap_err().is_not_configured());
    assert!(h.engine.delete_secret("/a", "k").unwrap_err().is_not_configured());
    assert!(h.engine.list_secret_keys("/a").unwrap_err().is_not_configured());
    assert!(h.engine.list_secret_resources().unwrap_err().is_not_configured());
}

#[test]
fn test_missing_secret_fails_the_save() {
    let dir = TempDir::new().unwrap();
    let h = Harness::teams().with_secret_store(open_store(&dir));
    let stored = Resource::new(json!({"name": "team-a", "token": "{{secret \"other\"}}"}));

    let err = h
        .engine
        .save_remote_resource("/teams/team-a", &stored)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Secrets(restsync_secrets::Error::SecretNotFound { .. })
    ));
    assert_eq!(h.server.count(CallKind::Create), 0);
}

#[test]
fn test_numeric_secret_is_sent_as_a_number() {
    let dir = TempDir::new().unwrap();
    let h = Harness::teams().with_secret_store(open_store(&dir));
    let plain = Resource::new(json!({"name": "team-a", "token": 8080}));

    let masked = h
        .engine
        .mask_resource_secrets("/teams/team-a", &plain, true)
        .unwrap();
    h.engine.save_remote_resource("/teams/team-a", &masked).unwrap();

    let create = h
        .server
        .calls()
        .into_iter()
        .find(|c| c.kind == CallKind::Create)
        .unwrap();
    assert_eq!(create.body, Some(json!({"name": "team-a", "token": 8080})));
}

#[test]
fn test_placeholder_like_description_does_not_block_saves() {
    let h = Harness::teams();
    let team = Resource::new(json!({"name": "team-a", "description": "use {{secret foo}} in templates"}));

    h.engine.save_remote_resource("/teams/team-a", &team).unwrap();
    assert_eq!(h.server.count(CallKind::Create), 1);
}
