use pretty_assertions::assert_eq;
use restsync_fs::ConfigStore;
use rstest::rstest;
use serde::{Deserialize, Serialize};
use std::fs;
use tempfile::TempDir;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct TestConfig {
    name: String,
    count: i32,
}

#[rstest]
#[case("config.toml", "name = \"test\"\ncount = 42")]
#[case("config.json", r#"{"name": "test", "count": 42}"#)]
#[case("config.yaml", "name: test\ncount: 42")]
#[case("config.yml", "name: test\ncount: 42")]
fn test_load_by_extension(#[case] file: &str, #[case] content: &str) {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(file);
    fs::write(&path, content).unwrap();

    let config: TestConfig = ConfigStore::new().load(&path).unwrap();

    assert_eq!(
        config,
        TestConfig {
            name: "test".into(),
            count: 42
        }
    );
}

#[rstest]
#[case("config.toml")]
#[case("config.json")]
#[case("config.yaml")]
fn test_save_then_load(#[case] file: &str) {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(file);
    let store = ConfigStore::new();
    let config = TestConfig {
        name: "saved".into(),
        count: 7,
    };

    store.save(&path, &config).unwrap();
    let loaded: TestConfig = store.load(&path).unwrap();

    assert_eq!(loaded, config);
}

#[test]
fn test_save_json_is_indented() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.json");

    ConfigStore::new()
        .save(&path, &TestConfig { name: "x".into(), count: 1 })
        .unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("\n  \"name\""), "got: {content}");
}

#[test]
fn test_load_invalid_content_reports_format() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();

    let err = ConfigStore::new().load::<TestConfig>(&path).unwrap_err();
    assert!(err.to_string().contains("JSON"), "got: {err}");
}

#[test]
fn test_unsupported_extension() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.ini");
    fs::write(&path, "x=1").unwrap();

    let err = ConfigStore::new().load::<TestConfig>(&path).unwrap_err();
    assert!(matches!(err, restsync_fs::Error::UnsupportedFormat { .. }));
}
