#![allow(clippy::result_large_err)]

use super::{ConfigLoader, Settings};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Key-value persistence for [`Settings`].
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<Settings, AppError>;
    fn save(&self, settings: &Settings) -> Result<(), AppError>;
}

/// Settings kept in a TOML file, readable only by the owner on unix.
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn at_default_location() -> Result<Self, AppError> {
        Ok(Self::new(ConfigLoader::default_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for TomlSettingsStore {
    fn load(&self) -> Result<Settings, AppError> {
        ConfigLoader::load(&self.path)
    }

    fn save(&self, settings: &Settings) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::new(
                    ErrorCategory::IoError,
                    format!("Failed to create settings directory {}: {}", parent.display(), e),
                )
            })?;
        }

        let content = toml::to_string_pretty(settings).map_err(|e| {
            AppError::new(
                ErrorCategory::SerializationError,
                format!("Failed to serialize settings: {}", e),
            )
        })?;

        fs::write(&self.path, content).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to write settings file {}: {}", self.path.display(), e),
            )
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %self.path.display(), "Saved settings");
        Ok(())
    }
}

/// In-process store, for embedding and tests.
#[derive(Default)]
pub struct MemorySettingsStore {
    settings: Mutex<Settings>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Settings, AppError> {
        self.settings
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| AppError::new(ErrorCategory::InternalError, "settings lock poisoned"))
    }

    fn save(&self, settings: &Settings) -> Result<(), AppError> {
        let mut guard = self
            .settings
            .lock()
            .map_err(|_| AppError::new(ErrorCategory::InternalError, "settings lock poisoned"))?;
        *guard = settings.clone();
        Ok(())
    }
}
