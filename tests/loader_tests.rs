//! Integration tests for layered configuration loading.
//!
//! Each test builds a config directory in a temp dir and injects variables
//! through `MapEnv`, so nothing depends on the process environment.

use layered_config::config::{ConfigLoader, LoadOptions, MapEnv, SourceKind, load, must_load};
use layered_config::error::ErrorKind;
use serde::Deserialize;
use std::fs;
use tempfile::TempDir;

#[derive(Debug, Deserialize, PartialEq)]
struct AppConfig {
    name: String,
    port: u16,
    #[serde(default)]
    debug: bool,
}

#[derive(Debug, Deserialize, PartialEq)]
struct DatabaseConfig {
    host: String,
    port: u16,
    #[serde(default)]
    max_open: Option<u32>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Settings {
    app: AppConfig,
    database: DatabaseConfig,
}

const BASE: &str = r#"
app:
  name: demo
  port: 8080
database:
  host: localhost
  port: 5432
"#;

const PRODUCTION: &str = r#"
app:
  port: 3000
database:
  host: db.internal
"#;

fn setup_dir(files: &[(&str, &str)]) -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp directory");
    for (name, contents) in files {
        fs::write(temp.path().join(name), contents).expect("Failed to write config file");
    }
    temp
}

fn options(env: MapEnv) -> LoadOptions {
    LoadOptions::new().with_env_source(env)
}

#[test]
fn test_base_only() {
    let temp = setup_dir(&[("base.yaml", BASE)]);
    let settings = load::<Settings>(temp.path(), options(MapEnv::new())).unwrap();

    assert_eq!(settings.app.name, "demo");
    assert_eq!(settings.app.port, 8080);
    assert_eq!(settings.database.host, "localhost");
    assert_eq!(settings.database.max_open, None);
}

#[test]
fn test_environment_file_overrides_base() {
    let temp = setup_dir(&[("base.yaml", BASE), ("production.yaml", PRODUCTION)]);
    let env = MapEnv::new().with("APP_ENV", "production");
    let settings = load::<Settings>(temp.path(), options(env)).unwrap();

    assert_eq!(settings.app.port, 3000);
    assert_eq!(settings.database.host, "db.internal");
    // keys only in base survive
    assert_eq!(settings.app.name, "demo");
    assert_eq!(settings.database.port, 5432);
}

#[test]
fn test_environment_name_is_trimmed_and_lowercased() {
    let temp = setup_dir(&[("base.yaml", BASE), ("production.yaml", PRODUCTION)]);
    let env = MapEnv::new().with("APP_ENV", "  Production ");
    let settings = load::<Settings>(temp.path(), options(env)).unwrap();
    assert_eq!(settings.app.port, 3000);
}

#[test]
fn test_missing_environment_file_is_skipped() {
    let temp = setup_dir(&[("base.yaml", BASE)]);
    let env = MapEnv::new().with("APP_ENV", "staging");
    let loaded = ConfigLoader::new(temp.path())
        .with_options(options(env))
        .load_tree()
        .unwrap();

    assert_eq!(loaded.environment, "staging");
    assert_eq!(loaded.sources.len(), 1);
    assert_eq!(loaded.sources[0].kind, SourceKind::Base);
}

#[test]
fn test_env_variable_overrides_files() {
    let temp = setup_dir(&[("base.yaml", BASE), ("production.yaml", PRODUCTION)]);
    let env = MapEnv::new()
        .with("APP_ENV", "production")
        .with("APP_APP__PORT", "9999");
    let settings = load::<Settings>(temp.path(), options(env)).unwrap();

    assert_eq!(settings.app.port, 9999);
    assert_eq!(settings.database.host, "db.internal");
}

#[test]
fn test_default_environment_is_local() {
    let temp = setup_dir(&[("base.yaml", BASE), ("local.yaml", "app:\n  port: 3000\n")]);
    let settings = load::<Settings>(temp.path(), options(MapEnv::new())).unwrap();
    assert_eq!(settings.app.port, 3000);

    let env = MapEnv::new().with("APP_APP__PORT", "9999");
    let settings = load::<Settings>(temp.path(), options(env)).unwrap();
    assert_eq!(settings.app.port, 9999);
}

#[test]
fn test_env_variable_single_underscore_is_part_of_key() {
    let temp = setup_dir(&[("base.yaml", BASE)]);
    let env = MapEnv::new().with("APP_DATABASE__MAX_OPEN", "25");
    let settings = load::<Settings>(temp.path(), options(env)).unwrap();
    assert_eq!(settings.database.max_open, Some(25));
}

#[test]
fn test_env_variable_coerces_bool() {
    let temp = setup_dir(&[("base.yaml", BASE)]);
    let env = MapEnv::new().with("APP_APP__DEBUG", "true");
    let settings = load::<Settings>(temp.path(), options(env)).unwrap();
    assert!(settings.app.debug);
}

#[test]
fn test_malformed_env_number_names_key() {
    let temp = setup_dir(&[("base.yaml", BASE)]);
    let env = MapEnv::new().with("APP_APP__PORT", "not-a-port");
    let err = load::<Settings>(temp.path(), options(env)).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unmarshal);
    assert!(err.is_decode());
    assert_eq!(err.key(), Some("app.port"));
    assert!(err.to_string().contains("app.port"));
}

#[test]
fn test_unrelated_env_variables_are_ignored() {
    let temp = setup_dir(&[("base.yaml", BASE)]);
    let env = MapEnv::new()
        .with("OTHER_APP__PORT", "1")
        .with("APP_CONFIG_DIR", "/elsewhere");
    let loaded = ConfigLoader::new(temp.path())
        .with_options(options(env))
        .load_tree()
        .unwrap();

    assert_eq!(loaded.lookup("app.port"), Some(&serde_json::json!(8080)));
    assert!(loaded.lookup("config_dir").is_none());
    assert!(loaded.sources.iter().all(|s| s.kind != SourceKind::Overlay));
}

#[test]
fn test_custom_prefix() {
    let temp = setup_dir(&[("base.yaml", BASE), ("production.yaml", PRODUCTION)]);
    let env = MapEnv::new()
        .with("SVC_ENV", "production")
        .with("SVC_DATABASE__PORT", "6543")
        .with("APP_DATABASE__PORT", "1");
    let settings =
        load::<Settings>(temp.path(), options(env).with_env_prefix("SVC_")).unwrap();

    assert_eq!(settings.database.host, "db.internal");
    assert_eq!(settings.database.port, 6543);
}

#[test]
fn test_scoped_load_matches_subtree() {
    let temp = setup_dir(&[("base.yaml", BASE), ("production.yaml", PRODUCTION)]);
    let env = MapEnv::new().with("APP_ENV", "production");

    let full = load::<Settings>(temp.path(), options(env.clone())).unwrap();
    let database =
        load::<DatabaseConfig>(temp.path(), options(env).with_path("database")).unwrap();

    assert_eq!(*database, full.database);
    assert_eq!(database.host, "db.internal");
    assert_eq!(database.port, 5432);
}

#[test]
fn test_scoped_load_missing_key() {
    let temp = setup_dir(&[("base.yaml", BASE)]);
    let err = load::<DatabaseConfig>(
        temp.path(),
        options(MapEnv::new()).with_path("nonexistent.key"),
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::KeyNotFound);
    assert_eq!(err.key(), Some("nonexistent.key"));
    assert!(err.to_string().contains("nonexistent.key"));
}

#[test]
fn test_load_is_idempotent() {
    let temp = setup_dir(&[("base.yaml", BASE), ("production.yaml", PRODUCTION)]);
    let loader = ConfigLoader::new(temp.path()).with_options(options(
        MapEnv::new()
            .with("APP_ENV", "production")
            .with("APP_APP__NAME", "svc"),
    ));

    let first = loader.load_tree().unwrap();
    let second = loader.load_tree().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_unreadable_base_file() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("base.yaml")).unwrap();
    let err = load::<Settings>(temp.path(), options(MapEnv::new())).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::FileRead);
    assert_eq!(err.file(), Some(temp.path().join("base.yaml").as_path()));
    assert!(err.to_string().contains("base.yaml"));
}

#[test]
fn test_unreadable_environment_file() {
    let temp = setup_dir(&[("base.yaml", BASE)]);
    fs::create_dir(temp.path().join("production.yaml")).unwrap();
    let env = MapEnv::new().with("APP_ENV", "production");
    let err = load::<Settings>(temp.path(), options(env)).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::FileRead);
    assert_eq!(
        err.file(),
        Some(temp.path().join("production.yaml").as_path())
    );
    assert!(err.to_string().contains("production.yaml"));
}

#[test]
fn test_dotted_env_variable_is_skipped() {
    let temp = setup_dir(&[("base.yaml", BASE)]);
    let env = MapEnv::new()
        .with("APP_.X", "1")
        .with("APP_A..B", "2")
        .with("APP_APP__PORT", "9000");
    let settings = load::<Settings>(temp.path(), options(env)).unwrap();
    assert_eq!(settings.app.port, 9000);
}

#[test]
fn test_missing_base_file() {
    let temp = setup_dir(&[("production.yaml", PRODUCTION)]);
    let err = load::<Settings>(temp.path(), options(MapEnv::new())).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingBaseFile);
    assert!(err.is_setup());
    assert_eq!(err.file(), Some(temp.path().join("base.yaml").as_path()));
}

#[test]
fn test_missing_config_dir() {
    let temp = TempDir::new().unwrap();
    let err = load::<Settings>(temp.path().join("nope"), options(MapEnv::new())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigDirNotFound);
}

#[test]
fn test_config_dir_is_a_file() {
    let temp = setup_dir(&[("base.yaml", BASE)]);
    let err =
        load::<Settings>(temp.path().join("base.yaml"), options(MapEnv::new())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigDirNotFound);
    assert!(err.to_string().contains("not a directory"));
}

#[test]
fn test_blank_config_dir() {
    let err = load::<Settings>("   ", options(MapEnv::new())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingConfigDir);
}

#[test]
fn test_blank_config_dir_uses_default_when_given() {
    let temp = setup_dir(&[("base.yaml", BASE)]);
    let settings = load::<Settings>(
        "",
        options(MapEnv::new()).with_default_dir(temp.path()),
    )
    .unwrap();
    assert_eq!(settings.app.port, 8080);
}

#[test]
fn test_parse_error_names_file() {
    let temp = setup_dir(&[("base.yaml", BASE), ("production.yaml", "app: [unclosed\n")]);
    let env = MapEnv::new().with("APP_ENV", "production");
    let err = load::<Settings>(temp.path(), options(env)).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::FileParse);
    assert_eq!(
        err.file(),
        Some(temp.path().join("production.yaml").as_path())
    );
    assert!(err.to_string().contains("production.yaml"));
}

#[test]
fn test_top_level_must_be_mapping() {
    let temp = setup_dir(&[("base.yaml", "- a\n- b\n")]);
    let err = load::<Settings>(temp.path(), options(MapEnv::new())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileParse);
}

#[test]
fn test_empty_environment_file_changes_nothing() {
    let temp = setup_dir(&[("base.yaml", BASE), ("production.yaml", "")]);
    let env = MapEnv::new().with("APP_ENV", "production");
    let settings = load::<Settings>(temp.path(), options(env)).unwrap();
    assert_eq!(settings.app.port, 8080);
}

#[test]
fn test_lists_are_replaced() {
    let temp = setup_dir(&[
        ("base.yaml", "hosts: [a, b, c]\n"),
        ("production.yaml", "hosts: [d]\n"),
    ]);

    #[derive(Deserialize)]
    struct Hosts {
        hosts: Vec<String>,
    }

    let env = MapEnv::new().with("APP_ENV", "production");
    let hosts = load::<Hosts>(temp.path(), options(env.clone())).unwrap();
    assert_eq!(hosts.hosts, vec!["d"]);

    // a comma-separated variable fills a list
    let env = env.with("APP_HOSTS", "x, y");
    let hosts = load::<Hosts>(temp.path(), options(env)).unwrap();
    assert_eq!(hosts.hosts, vec!["x", "y"]);
}

#[test]
fn test_explicit_environment_wins_over_variable() {
    let temp = setup_dir(&[("base.yaml", BASE), ("production.yaml", PRODUCTION)]);
    let env = MapEnv::new().with("APP_ENV", "staging");
    let settings =
        load::<Settings>(temp.path(), options(env).with_environment("production")).unwrap();
    assert_eq!(settings.app.port, 3000);
}

#[test]
fn test_sources_are_reported_in_merge_order() {
    let temp = setup_dir(&[("base.yaml", BASE), ("production.yaml", PRODUCTION)]);
    let env = MapEnv::new()
        .with("APP_ENV", "production")
        .with("APP_APP__PORT", "1");
    let loaded = ConfigLoader::new(temp.path())
        .with_options(options(env))
        .load_tree()
        .unwrap();

    let kinds: Vec<SourceKind> = loaded.sources.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![SourceKind::Base, SourceKind::Environment, SourceKind::Overlay]
    );
    assert_eq!(loaded.sources[0].keys, 4);
    assert_eq!(loaded.sources[1].keys, 2);
    assert_eq!(loaded.sources[2].keys, 1);
}

#[test]
fn test_must_load_returns_value() {
    let temp = setup_dir(&[("base.yaml", BASE)]);
    let app = must_load::<AppConfig>(temp.path(), options(MapEnv::new()).with_path("app"));
    assert_eq!(app.name, "demo");
}

#[test]
#[should_panic(expected = "failed to load configuration")]
fn test_must_load_panics_on_error() {
    let temp = TempDir::new().unwrap();
    let _ = must_load::<Settings>(temp.path(), options(MapEnv::new()));
}
