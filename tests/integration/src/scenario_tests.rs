//! End-to-end scenarios
//!
//! Each test builds a context on disk (filesystem repository, metadata
//! file, passphrase-protected secret store) and drives the engine against
//! the recording fake server.

use std::fs;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use restsync_core::{
    ContextConfig, DeleteOutcome, Error, FsRepository, Reconciler, ResourceRepository, SyncOutcome,
};
use restsync_resource::{LogicalPath, PatchOperation, Resource};
use restsync_test_utils::{CallKind, FakeServer};
use serde_json::{Value, json};
use tempfile::TempDir;

// =============================================================================
// Test Infrastructure
// =============================================================================

const METADATA: &str = r#"
["/teams/_"]
resource_info = { id_from_attribute = "id", alias_from_attribute = "name", secret_in_attributes = ["credentials.token"] }

["/teams/_".compare]
suppress = ["id"]

["/teams/_/members/_"]
resource_info = { id_from_attribute = "id", alias_from_attribute = "login", secret_in_attributes = [] }

["/teams/_/members/_".update]
method = "PATCH"
"#;

const CONTEXT: &str = r#"
metadata = "metadata.toml"

[repository]
root = "resources"

[secret_store]
path = "secrets.json"
passphrase = "correct horse battery staple"
kdf = { time = 1, memory = 8192, threads = 1 }
"#;

/// A context directory plus the fake server the engine talks to.
struct Workspace {
    dir: TempDir,
    server: FakeServer,
}

impl Workspace {
    fn new() -> Self {
        Self::with_context(CONTEXT)
    }

    fn with_context(context: &str) -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("metadata.toml"), METADATA).unwrap();
        fs::write(dir.path().join("context.toml"), context).unwrap();
        Self {
            dir,
            server: FakeServer::default().with_id_prefix("t"),
        }
    }

    fn engine(&self) -> Reconciler {
        ContextConfig::load(&self.dir.path().join("context.toml"))
            .unwrap()
            .build_reconciler()
            .unwrap()
            .with_server(Arc::new(self.server.clone()))
    }

    fn repository(&self) -> FsRepository {
        FsRepository::new(self.dir.path().join("resources"))
    }

    fn write_local(&self, path: &str, body: &Resource) {
        self.repository()
            .apply_resource(&LogicalPath::parse(path).unwrap(), body)
            .unwrap();
    }
}

fn resource(value: Value) -> Resource {
    Resource::new(value)
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_team_lifecycle() {
    let ws = Workspace::new();
    let engine = ws.engine();

    // Onboard: secrets leave the body before it is stored locally
    let plain = resource(json!({
        "name": "team-a",
        "description": "A",
        "credentials": {"token": "tok-123"}
    }));
    let masked = engine
        .mask_resource_secrets("/teams/team-a", &plain, true)
        .unwrap();
    ws.write_local("/teams/team-a", &masked);
    let on_disk = fs::read_to_string(ws.dir.path().join("resources/teams/team-a/resource.json")).unwrap();
    assert!(!on_disk.contains("tok-123"));

    // First save creates with the plaintext secret
    let local = engine.get_local_resource("/teams/team-a").unwrap();
    engine.save_remote_resource("/teams/team-a", &local).unwrap();
    assert_eq!(
        ws.server.items("/teams"),
        vec![json!({
            "id": "t-1",
            "name": "team-a",
            "description": "A",
            "credentials": {"token": "tok-123"}
        })]
    );

    // No drift from the secret representation or the server id
    assert!(engine.diff_resource("/teams/team-a").unwrap().is_clean());

    // A local edit shows up as drift, then saving updates
    let edited = resource(json!({
        "name": "team-a",
        "description": "B",
        "credentials": {"token": "{{secret .}}"}
    }));
    ws.write_local("/teams/team-a", &edited);
    let report = engine.diff_resource("/teams/team-a").unwrap();
    assert_eq!(
        report.patch,
        vec![PatchOperation::Replace {
            path: "/description".into(),
            value: json!("B"),
        }]
    );

    engine.save_remote_resource("/teams/team-a", &edited).unwrap();
    assert_eq!(ws.server.count(CallKind::Create), 1);
    assert_eq!(ws.server.count(CallKind::Update), 1);
    assert!(engine.diff_resource("/teams/team-a").unwrap().is_clean());

    // Delete is idempotent
    assert_eq!(
        engine.delete_remote_resource("/teams/team-a").unwrap(),
        DeleteOutcome::Deleted
    );
    assert_eq!(
        engine.delete_remote_resource("/teams/team-a").unwrap(),
        DeleteOutcome::AlreadyAbsent
    );
}

#[test]
fn test_alias_resolves_to_server_id() {
    let ws = Workspace::new();
    ws.write_local("/teams/team-a", &resource(json!({"name": "team-a"})));
    ws.server.seed("/teams", json!({"id": "t-1", "name": "team-a"}));

    let resolved = ws.engine().resolve_remote_path("/teams/team-a").unwrap();
    assert_eq!(resolved.remote.to_string(), "/teams/t-1");
}

#[test]
fn test_member_of_aliased_team() {
    let ws = Workspace::new();
    ws.write_local("/teams/team-a", &resource(json!({"name": "team-a"})));
    ws.server.seed("/teams", json!({"id": "t-1", "name": "team-a"}));
    let engine = ws.engine();
    let alice = resource(json!({"login": "alice", "role": "owner"}));

    engine
        .save_remote_resource("/teams/team-a/members/alice", &alice)
        .unwrap();
    engine
        .save_remote_resource("/teams/team-a/members/alice", &alice)
        .unwrap();

    let calls = ws.server.calls();
    let create = calls.iter().find(|c| c.kind == CallKind::Create).unwrap();
    assert_eq!(create.spec.path, "/teams/t-1/members");
    let update = calls.iter().find(|c| c.kind == CallKind::Update).unwrap();
    assert_eq!(update.spec.method, "PATCH");
    assert_eq!(update.spec.path, "/teams/t-1/members/t-2");
}

#[test]
fn test_secret_store_reopens_byte_for_byte() {
    let ws = Workspace::new();
    let value = "pässwörd \u{1F511} with\ttabs and \"quotes\"";
    {
        let engine = ws.engine();
        engine.set_secret("/teams/team-a", "credentials.token", value).unwrap();
    }

    let envelope: Value =
        serde_json::from_str(&fs::read_to_string(ws.dir.path().join("secrets.json")).unwrap()).unwrap();
    assert_eq!(envelope["version"], 1);
    assert_eq!(envelope["cipher"]["name"], "aes-256-gcm");
    assert_eq!(envelope["kdf"]["name"], "argon2id");
    assert_eq!(envelope["kdf"]["time"], 1);
    assert_eq!(envelope["kdf"]["memory"], 8192);
    assert_eq!(envelope["kdf"]["threads"], 1);

    let reopened = ws.engine();
    assert_eq!(
        reopened
            .get_secret("/teams/team-a", "credentials.token")
            .unwrap()
            .as_bytes(),
        value.as_bytes()
    );
}

#[test]
fn test_masking_a_collection_is_rejected() {
    let ws = Workspace::new();
    let teams = resource(json!([
        {"name": "a", "credentials": {"token": "x"}},
        {"name": "b", "credentials": {"token": "y"}}
    ]));

    let err = ws
        .engine()
        .mask_resource_secrets("/teams/", &teams, true)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Secrets(restsync_secrets::Error::CollectionSecrets { .. })
    ));
}

#[test]
fn test_placeholder_without_secret_store_is_not_sent() {
    let ws = Workspace::with_context("metadata = \"metadata.toml\"\n\n[repository]\nroot = \"resources\"\n");
    let body = resource(json!({"name": "team-a", "credentials": {"token": "{{secret .}}"}}));

    let err = ws
        .engine()
        .save_remote_resource("/teams/team-a", &body)
        .unwrap_err();
    assert!(err.is_not_configured());
    assert_eq!(ws.server.count(CallKind::Create), 0);
}

#[test]
fn test_filesystem_repository_has_no_remote_sync() {
    let ws = Workspace::new();
    assert_eq!(ws.engine().push_repository().unwrap(), SyncOutcome::Unsupported);
}
