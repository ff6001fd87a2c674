use git_deployer::core::config::{ConfigLoader, ConfigValidator, Settings, SettingsStore, TomlSettingsStore};
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn clear_deployer_env() {
    for v in &[
        "GIT_DEPLOYER_CONFIG",
        "GIT_DEPLOYER_ACCESS_TOKEN",
        "GIT_DEPLOYER_REPOSITORY_URL",
        "GIT_DEPLOYER_REPOSITORIES_DIR",
        "GIT_DEPLOYER_REMOTE",
    ] {
        env::remove_var(v);
    }
}

#[test]
#[serial]
fn test_settings_file_and_env_overrides() {
    clear_deployer_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.toml");

    let config_content = r#"
access_token = "from-file"
repository_url = "https://github.com/acme/storefront.git"

[environments]
staging = "release/staging"
live = "main"

[queue]
settle_delay = "250ms"
command_timeout = "off"
"#;
    fs::write(&path, config_content).unwrap();

    let settings = ConfigLoader::load(&path).unwrap();
    assert_eq!(settings.access_token, "from-file");
    assert_eq!(settings.remote, "origin");
    assert_eq!(
        settings.environments.keys().collect::<Vec<_>>(),
        vec!["staging", "live"]
    );
    assert_eq!(settings.queue.settle_delay, Duration::from_millis(250));
    assert_eq!(settings.queue.command_timeout, None);
    ConfigValidator::validate(&settings).unwrap();

    env::set_var("GIT_DEPLOYER_ACCESS_TOKEN", "from-env");
    env::set_var("GIT_DEPLOYER_REMOTE", "upstream");
    env::set_var("GIT_DEPLOYER_REPOSITORIES_DIR", "/srv/deployer");
    let overridden = ConfigLoader::load(&path).unwrap();
    clear_deployer_env();

    assert_eq!(overridden.access_token, "from-env");
    assert_eq!(overridden.remote, "upstream");
    assert_eq!(overridden.repositories_dir, Some(PathBuf::from("/srv/deployer")));
    assert_eq!(
        overridden.repository_url(),
        Some("https://github.com/acme/storefront.git")
    );
}

#[test]
#[serial]
fn test_missing_file_loads_defaults() {
    clear_deployer_env();
    let temp_dir = TempDir::new().unwrap();

    let settings = ConfigLoader::load(&temp_dir.path().join("absent.toml")).unwrap();
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.mapping("preprod").unwrap().branch, "release/candidate");
}

#[test]
#[serial]
fn test_config_env_selects_settings_path() {
    clear_deployer_env();
    env::set_var("GIT_DEPLOYER_CONFIG", "/etc/git-deployer/custom.toml");
    let path = ConfigLoader::default_path().unwrap();
    clear_deployer_env();

    assert_eq!(path, PathBuf::from("/etc/git-deployer/custom.toml"));
    let fallback = ConfigLoader::default_path().unwrap();
    assert!(fallback.ends_with("settings.toml"));
}

#[test]
#[serial]
fn test_store_saves_and_reloads() {
    clear_deployer_env();
    let temp_dir = TempDir::new().unwrap();
    let store = TomlSettingsStore::new(temp_dir.path().join("git-deployer").join("settings.toml"));

    let mut settings = store.load().unwrap();
    settings.repository_url = Some("git@github.com:acme/tools.git".to_string());
    settings.access_token = "ghp_secret".to_string();
    settings.environments.shift_remove("dev-test");
    store.save(&settings).unwrap();

    let written = fs::read_to_string(store.path()).unwrap();
    assert!(written.contains("repository_url = \"git@github.com:acme/tools.git\""));
    assert!(!written.contains("dev-test"));

    let reloaded = store.load().unwrap();
    assert_eq!(reloaded, settings);
}

#[test]
#[serial]
fn test_invalid_environment_rejected() {
    clear_deployer_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.toml");
    fs::write(&path, "[environments]\nprod = \"main branch\"\n").unwrap();

    let settings = ConfigLoader::load(&path).unwrap();
    let err = ConfigValidator::validate(&settings).unwrap_err();
    assert!(err.message.contains("prod"));
}
