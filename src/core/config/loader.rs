#![allow(clippy::result_large_err)]

use super::Settings;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit settings file.
pub const CONFIG_PATH_ENV: &str = "GIT_DEPLOYER_CONFIG";
const SETTINGS_FILE: &str = "settings.toml";
const APP_DIR: &str = "git-deployer";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Settings file location: `$GIT_DEPLOYER_CONFIG`, else
    /// `<config dir>/git-deployer/settings.toml`, else `~/.git-deployer/settings.toml`.
    pub fn default_path() -> Result<PathBuf, AppError> {
        if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        if let Some(config_dir) = dirs_next::config_dir() {
            return Ok(config_dir.join(APP_DIR).join(SETTINGS_FILE));
        }
        dirs_next::home_dir()
            .map(|home| home.join(".git-deployer").join(SETTINGS_FILE))
            .ok_or_else(|| {
                AppError::new(
                    ErrorCategory::ConfigurationError,
                    "Cannot determine a settings location: no config or home directory",
                )
            })
    }

    /// Load settings from `path` (defaults when absent), then apply
    /// environment variable overrides.
    pub fn load(path: &Path) -> Result<Settings, AppError> {
        let mut settings = Self::load_from_file(path)?.unwrap_or_default();
        Self::apply_env_overrides(&mut settings);
        Ok(settings)
    }

    /// Load settings from a specific file path.
    /// Returns Ok(None) if the file doesn't exist.
    pub fn load_from_file(path: &Path) -> Result<Option<Settings>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read settings file {}: {}", path.display(), e),
            )
        })?;

        let settings: Settings = toml::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::ConfigurationError,
                format!("Failed to parse settings file {}: {}", path.display(), e),
            )
        })?;

        Ok(Some(settings))
    }

    /// Environment variables take precedence over file values
    fn apply_env_overrides(settings: &mut Settings) {
        if let Ok(token) = env::var("GIT_DEPLOYER_ACCESS_TOKEN") {
            settings.access_token = token;
        }

        if let Ok(url) = env::var("GIT_DEPLOYER_REPOSITORY_URL") {
            settings.repository_url = Some(url);
        }

        if let Ok(dir) = env::var("GIT_DEPLOYER_REPOSITORIES_DIR") {
            settings.repositories_dir = Some(PathBuf::from(dir));
        }

        if let Ok(remote) = env::var("GIT_DEPLOYER_REMOTE") {
            settings.remote = remote;
        }
    }

    /// Get documentation for supported environment variables
    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "GIT_DEPLOYER_CONFIG - Path of the settings file",
            "GIT_DEPLOYER_ACCESS_TOKEN - Override the access token used for https clones",
            "GIT_DEPLOYER_REPOSITORY_URL - Override the repository URL",
            "GIT_DEPLOYER_REPOSITORIES_DIR - Override the directory holding checkouts",
            "GIT_DEPLOYER_REMOTE - Override the remote name (default: origin)",
        ]
    }
}
