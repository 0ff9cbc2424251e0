//! Context configuration loading and engine construction

use std::fs;

use pretty_assertions::assert_eq;
use restsync_core::{ContextConfig, Error, RepositoryConfig};
use restsync_secrets::SecretStoreConfig;
use restsync_test_utils::fixtures::fast_kdf;
use tempfile::TempDir;

fn context_with_store(dir: &TempDir, passphrase: &str) -> ContextConfig {
    ContextConfig {
        repository: RepositoryConfig {
            root: dir.path().join("resources"),
        },
        metadata: None,
        secret_store: Some(
            SecretStoreConfig::with_passphrase(dir.path().join("secrets.json"), passphrase)
                .kdf_params(fast_kdf()),
        ),
    }
}

#[test]
fn test_json_and_yaml_contexts_match_toml() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("context.toml"),
        "[repository]\nroot = \"resources\"\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("context.json"),
        r#"{"repository": {"root": "resources"}}"#,
    )
    .unwrap();
    fs::write(dir.path().join("context.yaml"), "repository:\n  root: resources\n").unwrap();

    let toml = ContextConfig::load(&dir.path().join("context.toml")).unwrap();
    let json = ContextConfig::load(&dir.path().join("context.json")).unwrap();
    let yaml = ContextConfig::load(&dir.path().join("context.yaml")).unwrap();
    assert_eq!(toml, json);
    assert_eq!(toml, yaml);
    assert_eq!(toml.repository.root, dir.path().join("resources"));
}

#[test]
fn test_saved_context_loads_back() {
    let dir = TempDir::new().unwrap();
    let config = context_with_store(&dir, "pw");
    let file = dir.path().join("context.toml");
    config.save(&file).unwrap();
    assert_eq!(ContextConfig::load(&file).unwrap(), config);
}

#[test]
fn test_wrong_passphrase_fails_closed_on_build() {
    let dir = TempDir::new().unwrap();
    {
        let engine = context_with_store(&dir, "right").build_reconciler().unwrap();
        engine.set_secret("/apps/a", "password", "hunter2").unwrap();
    }

    let err = context_with_store(&dir, "wrong")
        .build_reconciler()
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Secrets(restsync_secrets::Error::Decryption)
    ));
}

#[test]
fn test_ambiguous_key_sources_are_not_configured() {
    let dir = TempDir::new().unwrap();
    let mut config = context_with_store(&dir, "pw");
    if let Some(store) = config.secret_store.as_mut() {
        store.key = Some("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=".into());
    }
    let err = config.build_reconciler().unwrap_err();
    assert!(err.is_not_configured());
}

#[test]
fn test_missing_metadata_file_fails_build() {
    let dir = TempDir::new().unwrap();
    let config = ContextConfig {
        repository: RepositoryConfig {
            root: dir.path().join("resources"),
        },
        metadata: Some(dir.path().join("missing.toml")),
        secret_store: None,
    };
    assert!(config.build_reconciler().is_err());
}
