//! Configuration loading and resolution tests
//!
//! Tests that manipulate GRANTSCOPE_* environment variables are marked with
//! #[serial] so they never run in parallel with each other.

use grantscope_common::config::{
    default_root_folder, resolve_config_path, resolve_root_folder, RootFolderInitializer,
    TomlConfig, CONFIG_ENV_VAR, ENRICHMENT_API_KEY_ENV_VAR, ROOT_FOLDER_ENV_VAR,
};
use grantscope_common::FailurePolicy;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const FULL_CONFIG: &str = r#"
root_folder = "/srv/grantscope"

[logging]
level = "debug"

[pipeline]
enable_local_scoring = false
min_promotion = "medium_priority"
min_local_fit = 0.55

[enrichment]
endpoint = "https://enrich.example.org/v1/batch"
api_key = "toml-key"
timeout_secs = 20
cost_per_candidate = 0.12
batch_size = 5
max_candidates = 15
max_concurrent_requests = 3
requests_per_minute = 60
failure_policy = "fail_open"

[[tracks]]
id = "category_based"
auto_promote = 0.85
high_priority = 0.7

[[tracks]]
id = "regional_agency"
revenue_min = 250000.0
revenue_max = 250000000.0
"#;

#[test]
fn test_load_full_config_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, FULL_CONFIG).unwrap();

    let config = TomlConfig::load(&path).unwrap();

    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/grantscope")));
    assert_eq!(config.logging.level, "debug");
    assert!(!config.pipeline.enable_local_scoring);
    assert_eq!(config.pipeline.min_promotion.as_deref(), Some("medium_priority"));
    assert_eq!(config.pipeline.min_local_fit, 0.55);

    let enrichment = config.enrichment.as_ref().unwrap();
    assert_eq!(enrichment.endpoint, "https://enrich.example.org/v1/batch");
    assert_eq!(enrichment.timeout_secs, 20);
    assert_eq!(enrichment.batch_size, 5);
    assert_eq!(enrichment.max_candidates, 15);
    assert_eq!(enrichment.max_concurrent_requests, 3);
    assert_eq!(enrichment.requests_per_minute, 60);
    assert_eq!(enrichment.failure_policy, FailurePolicy::FailOpen);

    assert_eq!(config.tracks.len(), 2);
    assert_eq!(config.tracks[0].id, "category_based");
    assert_eq!(config.tracks[0].auto_promote, Some(0.85));
    assert_eq!(config.tracks[1].revenue_min, Some(250000.0));
}

#[test]
fn test_load_missing_file_is_error() {
    let dir = TempDir::new().unwrap();
    let result = TomlConfig::load(&dir.path().join("absent.toml"));
    assert!(result.is_err());
}

#[test]
fn test_load_malformed_file_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[pipeline\nmin_local_fit = ").unwrap();
    assert!(TomlConfig::load(&path).is_err());
}

#[test]
fn test_unknown_failure_policy_rejected() {
    let toml = r#"
        [enrichment]
        endpoint = "https://enrich.example.org/v1/batch"
        failure_policy = "fail_sometimes"
    "#;
    assert!(TomlConfig::from_toml_str(toml).is_err());
}

#[test]
#[serial]
fn test_config_path_cli_argument_wins() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/grantscope-env.toml");
    let cli = PathBuf::from("/tmp/grantscope-cli.toml");

    let resolved = resolve_config_path(Some(&cli));
    assert_eq!(resolved, Some(cli));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_config_path_from_environment() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/grantscope-env.toml");

    let resolved = resolve_config_path(None);
    assert_eq!(resolved, Some(PathBuf::from("/tmp/grantscope-env.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_load_or_default_reads_environment_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[logging]\nlevel = \"warn\"\n").unwrap();
    env::set_var(CONFIG_ENV_VAR, &path);

    let config = TomlConfig::load_or_default(None).unwrap();
    assert_eq!(config.logging.level, "warn");

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_root_folder_priority_order() {
    env::remove_var(ROOT_FOLDER_ENV_VAR);
    let config = TomlConfig::from_toml_str("root_folder = \"/srv/from-toml\"").unwrap();

    // TOML beats the OS default
    assert_eq!(
        resolve_root_folder(None, &config),
        PathBuf::from("/srv/from-toml")
    );

    // Environment beats TOML
    env::set_var(ROOT_FOLDER_ENV_VAR, "/srv/from-env");
    assert_eq!(
        resolve_root_folder(None, &config),
        PathBuf::from("/srv/from-env")
    );

    // CLI beats everything
    let cli = PathBuf::from("/srv/from-cli");
    assert_eq!(resolve_root_folder(Some(&cli), &config), cli);

    env::remove_var(ROOT_FOLDER_ENV_VAR);
}

#[test]
#[serial]
fn test_root_folder_falls_back_to_default() {
    env::remove_var(ROOT_FOLDER_ENV_VAR);
    let config = TomlConfig::default();
    assert_eq!(resolve_root_folder(None, &config), default_root_folder());
}

#[test]
#[serial]
fn test_api_key_environment_overrides_toml() {
    let config = TomlConfig::from_toml_str(FULL_CONFIG).unwrap();

    env::remove_var(ENRICHMENT_API_KEY_ENV_VAR);
    assert_eq!(config.enrichment_api_key().as_deref(), Some("toml-key"));

    env::set_var(ENRICHMENT_API_KEY_ENV_VAR, "env-key");
    assert_eq!(config.enrichment_api_key().as_deref(), Some("env-key"));

    // Whitespace-only values are ignored
    env::set_var(ENRICHMENT_API_KEY_ENV_VAR, "   ");
    assert_eq!(config.enrichment_api_key().as_deref(), Some("toml-key"));

    env::remove_var(ENRICHMENT_API_KEY_ENV_VAR);
}

#[test]
fn test_initializer_creates_root_and_names_database() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("nested").join("root");
    let initializer = RootFolderInitializer::new(root.clone());

    assert!(!root.exists());
    initializer.ensure_directory_exists().unwrap();
    assert!(root.exists());
    assert_eq!(initializer.database_path(), root.join("grantscope.db"));
}
