//! Tests for the reconciliation engine against the in-memory fakes

use std::sync::Arc;

use pretty_assertions::assert_eq;
use restsync_core::{
    DeleteOutcome, Error, Reconciler, RepositoryCapabilities, ServerError, SyncOutcome,
};
use restsync_metadata::{MetadataTree, OperationMetadata, ResourceMetadata};
use restsync_resource::Resource;
use restsync_test_utils::fixtures::{Harness, list_filter, teams_tree};
use restsync_test_utils::{CallKind, MemoryRepository};
use serde_json::json;

fn body(value: serde_json::Value) -> Resource {
    Resource::new(value)
}

mod resolution_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_alias_resolves_to_remote_id() {
        let h = Harness::teams();
        h.repository.insert("/teams/team-a", json!({"name": "team-a"}));
        h.server.seed("/teams", json!({"id": "t-1", "name": "team-a"}));

        let resolved = h.engine.resolve_remote_path("/teams/team-a").unwrap();
        assert_eq!(resolved.remote.to_string(), "/teams/t-1");
        assert_eq!(resolved.collection.to_string(), "/teams/");
        assert_eq!(resolved.replacements.get("team-a").map(String::as_str), Some("t-1"));

        let fetched = h.engine.get_remote_resource("/teams/team-a").unwrap();
        assert_eq!(fetched.value(), &json!({"id": "t-1", "name": "team-a"}));
    }

    #[test]
    fn test_local_id_is_used_without_scanning() {
        let h = Harness::teams();
        h.repository
            .insert("/teams/team-a", json!({"id": "t-9", "name": "team-a"}));

        let resolved = h.engine.resolve_remote_path("/teams/team-a").unwrap();
        assert_eq!(resolved.remote.to_string(), "/teams/t-9");
        assert_eq!(h.server.count(CallKind::List), 0);
    }

    #[test]
    fn test_unknown_segment_stays_literal() {
        let h = Harness::teams();
        let resolved = h.engine.resolve_remote_path("/teams/new-team").unwrap();
        assert_eq!(resolved.remote.to_string(), "/teams/new-team");
        assert!(!resolved.is_aliased());
    }

    #[test]
    fn test_child_collection_uses_resolved_parent() {
        let h = Harness::teams();
        h.repository.insert("/teams/team-a", json!({"name": "team-a"}));
        h.server.seed("/teams", json!({"id": "t-1", "name": "team-a"}));

        h.engine
            .save_remote_resource("/teams/team-a/members/alice", &body(json!({"login": "alice"})))
            .unwrap();

        let creates: Vec<_> = h
            .server
            .calls()
            .into_iter()
            .filter(|c| c.kind == CallKind::Create)
            .collect();
        assert_eq!(creates.len(), 1);
        assert_eq!(creates[0].spec.path, "/teams/t-1/members");
        assert_eq!(h.server.items("/teams/t-1/members").len(), 1);
    }

    #[test]
    fn test_collection_name_segments_are_not_scanned() {
        let h = Harness::teams();
        h.repository.insert("/teams/team-a", json!({"name": "team-a"}));
        h.server.seed("/teams", json!({"id": "t-1", "name": "team-a"}));
        h.server
            .seed("/teams/t-1/members", json!({"id": "m-7", "login": "alice"}));

        let resolved = h
            .engine
            .resolve_remote_path("/teams/team-a/members/alice")
            .unwrap();
        assert_eq!(resolved.remote.to_string(), "/teams/t-1/members/m-7");

        let listed: Vec<String> = h
            .server
            .calls()
            .into_iter()
            .filter(|c| c.kind == CallKind::List)
            .map(|c| c.spec.path)
            .collect();
        assert_eq!(listed, vec!["/teams", "/teams/t-1/members"]);
    }

    #[test]
    fn test_listing_an_item_address_is_a_remote_error() {
        let h = Harness::teams();
        h.server.seed("/teams", json!({"id": "t-1", "name": "team-a"}));

        let err = h.engine.list_remote_resources("/teams/t-1/").unwrap_err();
        assert!(matches!(err, Error::Remote { .. }), "{err:?}");
    }

    #[test]
    fn test_filtered_scan_falls_back_to_unfiltered() {
        let tree = teams_tree()
            .with(
                "/teams/_",
                ResourceMetadata {
                    list: Some(list_filter("enabled == true")),
                    ..Default::default()
                },
            )
            .unwrap();
        let h = Harness::new(tree);
        h.repository.insert("/teams/team-a", json!({"name": "team-a"}));
        h.server
            .seed("/teams", json!({"id": "t-1", "name": "team-a", "enabled": false}));

        let resolved = h.engine.resolve_remote_path("/teams/team-a").unwrap();
        assert_eq!(resolved.remote.to_string(), "/teams/t-1");
        assert_eq!(h.server.count(CallKind::List), 2);

        // The display listing keeps the filter
        assert!(h.engine.list_remote_resources("/teams/").unwrap().is_empty());
    }
}

mod save_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_save_creates_then_updates() {
        let h = Harness::teams();
        let team = body(json!({"name": "team-b", "description": "first"}));

        let created = h.engine.save_remote_resource("/teams/team-b", &team).unwrap();
        assert_eq!(created.attribute_string("id").unwrap().as_deref(), Some("t-1"));

        let team = body(json!({"name": "team-b", "description": "second"}));
        h.engine.save_remote_resource("/teams/team-b", &team).unwrap();

        assert_eq!(h.server.count(CallKind::Create), 1);
        assert_eq!(h.server.count(CallKind::Update), 1);
        assert_eq!(
            h.server.items("/teams"),
            vec![json!({"id": "t-1", "name": "team-b", "description": "second"})]
        );
    }

    #[test]
    fn test_create_conflict_updates_alias_match() {
        let h = Harness::teams();
        h.server.seed("/teams", json!({"id": "t-1", "name": "team-a"}));

        // A stale id skips the alias scan during resolution
        let stale = body(json!({"id": "old-9", "name": "team-a", "description": "x"}));
        h.engine.save_remote_resource("/teams/team-a", &stale).unwrap();

        assert_eq!(h.server.count(CallKind::Create), 1);
        assert_eq!(h.server.count(CallKind::Update), 1);
        let update = h
            .server
            .calls()
            .into_iter()
            .find(|c| c.kind == CallKind::Update)
            .unwrap();
        assert_eq!(update.spec.path, "/teams/t-1");
        assert_eq!(h.server.items("/teams").len(), 1);
    }

    #[test]
    fn test_save_collection_shares_one_listing() {
        let h = Harness::teams();
        let teams = body(json!([{"name": "a"}, {"name": "b"}]));

        let saved = h.engine.save_remote_resource("/teams/", &teams).unwrap();
        assert_eq!(saved.as_array().unwrap().len(), 2);
        assert_eq!(h.server.count(CallKind::List), 1);
        assert_eq!(h.server.count(CallKind::Create), 2);

        h.server.clear_calls();
        h.engine.save_remote_resource("/teams/", &teams).unwrap();
        assert_eq!(h.server.count(CallKind::List), 1);
        assert_eq!(h.server.count(CallKind::Create), 0);
        assert_eq!(h.server.count(CallKind::Update), 2);
    }

    #[test]
    fn test_save_collection_requires_array() {
        let h = Harness::teams();
        let err = h
            .engine
            .save_remote_resource("/teams/", &body(json!({"name": "a"})))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_collection_item_without_alias_is_rejected() {
        let h = Harness::teams();
        let err = h
            .engine
            .save_remote_resource("/teams/", &body(json!([{"description": "x"}])))
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(h.server.count(CallKind::Create), 0);
    }
}

mod strict_operation_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_create_conflict_propagates() {
        let h = Harness::teams();
        h.server.seed("/teams", json!({"id": "t-1", "name": "team-a"}));
        let err = h
            .engine
            .create_remote_resource("/teams/team-a", &body(json!({"name": "team-a"})))
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_update_missing_is_not_found_without_create() {
        let h = Harness::teams();
        let err = h
            .engine
            .update_remote_resource("/teams/nobody", &body(json!({"name": "nobody"})))
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(h.server.count(CallKind::Create), 0);
    }

    #[test]
    fn test_update_with_stale_id_finds_alias() {
        let h = Harness::teams();
        h.server.seed("/teams", json!({"id": "t-1", "name": "team-a"}));
        h.engine
            .update_remote_resource(
                "/teams/team-a",
                &body(json!({"id": "old", "name": "team-a", "description": "new"})),
            )
            .unwrap();
        assert_eq!(
            h.server.items("/teams"),
            vec![json!({"id": "t-1", "name": "team-a", "description": "new"})]
        );
    }

    #[test]
    fn test_delete_absent_is_success() {
        let h = Harness::teams();
        let outcome = h.engine.delete_remote_resource("/teams/ghost").unwrap();
        assert_eq!(outcome, DeleteOutcome::AlreadyAbsent);
        // Resolution and the alias fallback share one listing
        assert_eq!(h.server.count(CallKind::List), 1);
    }

    #[test]
    fn test_delete_by_alias() {
        let h = Harness::teams();
        h.repository.insert("/teams/team-a", json!({"name": "team-a"}));
        h.server.seed("/teams", json!({"id": "t-1", "name": "team-a"}));

        let outcome = h.engine.delete_remote_resource("/teams/team-a").unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert!(h.server.items("/teams").is_empty());
    }

    #[test]
    fn test_delete_transport_failure_propagates() {
        let h = Harness::teams();
        h.server
            .fail_on(CallKind::Delete, ServerError::other(Some(500), "boom"));
        let err = h.engine.delete_remote_resource("/teams/team-a").unwrap_err();
        assert!(matches!(err, Error::Remote { ref operation, .. } if operation == "delete"));
    }

    #[test]
    fn test_disabled_operation_is_undefined() {
        let tree = teams_tree()
            .with(
                "/teams/_",
                ResourceMetadata {
                    delete: Some(OperationMetadata {
                        enabled: Some(false),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .unwrap();
        let h = Harness::new(tree);
        let err = h.engine.delete_remote_resource("/teams/team-a").unwrap_err();
        assert!(matches!(err, Error::OperationUndefined { .. }));
        assert_eq!(h.server.count(CallKind::Delete), 0);
    }
}

mod surface_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_without_server_is_not_configured() {
        let engine = Reconciler::new(Arc::new(MemoryRepository::new()), Arc::new(teams_tree()));
        let err = engine.get_remote_resource("/teams/a").unwrap_err();
        assert!(err.is_not_configured());
    }

    #[test]
    fn test_invalid_paths_are_rejected_before_io() {
        let h = Harness::teams();
        for raw in ["", "/teams/../x", "/teams/./x"] {
            let err = h.engine.get_remote_resource(raw).unwrap_err();
            assert!(err.is_validation(), "{raw:?}: {err}");
        }
        assert!(h.server.calls().is_empty());
    }

    #[test]
    fn test_strict_operations_need_resource_paths() {
        let h = Harness::teams();
        let err = h.engine.delete_remote_resource("/teams/").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_get_local_resource() {
        let h = Harness::teams();
        h.repository.insert("/teams/a", json!({"name": "a"}));
        assert_eq!(
            h.engine.get_local_resource("/teams/a").unwrap().value(),
            &json!({"name": "a"})
        );
        assert!(h.engine.get_local_resource("/teams/b").unwrap_err().is_not_found());
    }

    #[test]
    fn test_collection_get_lists_items() {
        let h = Harness::teams();
        h.server.seed("/teams", json!({"id": "t-1", "name": "a"}));
        h.server.seed("/teams", json!({"id": "t-2", "name": "b"}));

        let listed = h.engine.get_remote_resource("/teams/").unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 2);
        assert_eq!(h.engine.list_remote_resources("/teams").unwrap().len(), 2);
    }

    #[test]
    fn test_each_call_fetches_again() {
        let h = Harness::teams();
        h.repository.insert("/teams/team-a", json!({"name": "team-a"}));
        h.server.seed("/teams", json!({"id": "t-1", "name": "team-a"}));

        h.engine.get_remote_resource("/teams/team-a").unwrap();
        h.engine.get_remote_resource("/teams/team-a").unwrap();
        assert_eq!(h.server.count(CallKind::List), 2);
    }

    #[test]
    fn test_repository_sync_capabilities() {
        let plain = Reconciler::new(Arc::new(MemoryRepository::new()), Arc::new(MetadataTree::new()));
        assert_eq!(plain.push_repository().unwrap(), SyncOutcome::Unsupported);
        assert_eq!(plain.pull_repository().unwrap(), SyncOutcome::Unsupported);
        assert_eq!(plain.reset_repository().unwrap(), SyncOutcome::Unsupported);

        let repository = MemoryRepository::new().with_capabilities(RepositoryCapabilities::all());
        let engine = Reconciler::new(Arc::new(repository.clone()), Arc::new(MetadataTree::new()));
        assert_eq!(engine.push_repository().unwrap(), SyncOutcome::Completed);
        assert_eq!(engine.pull_repository().unwrap(), SyncOutcome::Completed);
        assert_eq!(engine.reset_repository().unwrap(), SyncOutcome::Completed);
        assert_eq!(repository.sync_calls(), 3);
    }
}
