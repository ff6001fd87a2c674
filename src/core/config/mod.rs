pub mod loader;
pub mod store;
pub mod validation;

pub use loader::ConfigLoader;
pub use store::{MemorySettingsStore, SettingsStore, TomlSettingsStore};
pub use validation::ConfigValidator;

use crate::core::git::DEFAULT_SETTLE_DELAY;
use git_deployer_types::EnvironmentMapping;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

/// User settings persisted in settings.toml
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Token injected into https clone URLs
    #[serde(default)]
    pub access_token: String,

    /// Remote repository holding the branches and marker tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,

    /// Remote name used for fetch and push
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Override for the directory holding one checkout per repository URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repositories_dir: Option<PathBuf>,

    /// Environment name to branch name
    #[serde(default = "default_environments")]
    pub environments: IndexMap<String, String>,

    /// Command queue tuning
    #[serde(default)]
    pub queue: QueueSettings,
}

/// Command queue configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueSettings {
    /// Pause between consecutive git commands
    #[serde(default = "default_settle_delay", with = "duration_text")]
    pub settle_delay: Duration,

    /// Limit for any single git command; "off" disables it
    #[serde(default = "default_command_timeout", with = "optional_duration_text")]
    pub command_timeout: Option<Duration>,
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_environments() -> IndexMap<String, String> {
    [
        ("dev-test", "develop"),
        ("test", "release/test"),
        ("preprod", "release/candidate"),
        ("prod", "master"),
    ]
    .into_iter()
    .map(|(name, branch)| (name.to_string(), branch.to_string()))
    .collect()
}

fn default_settle_delay() -> Duration {
    DEFAULT_SETTLE_DELAY
}

fn default_command_timeout() -> Option<Duration> {
    Some(DEFAULT_COMMAND_TIMEOUT)
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            access_token: String::new(),
            repository_url: None,
            remote: default_remote(),
            repositories_dir: None,
            environments: default_environments(),
            queue: QueueSettings::default(),
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        QueueSettings {
            settle_delay: default_settle_delay(),
            command_timeout: default_command_timeout(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.access_token.is_empty() {
            ""
        } else {
            "<redacted>"
        };
        f.debug_struct("Settings")
            .field("access_token", &token)
            .field("repository_url", &self.repository_url)
            .field("remote", &self.remote)
            .field("repositories_dir", &self.repositories_dir)
            .field("environments", &self.environments)
            .field("queue", &self.queue)
            .finish()
    }
}

impl Settings {
    /// Configured environments in file order.
    pub fn mappings(&self) -> Vec<EnvironmentMapping> {
        self.environments
            .iter()
            .map(|(name, branch)| EnvironmentMapping::new(name, branch))
            .collect()
    }

    pub fn mapping(&self, name: &str) -> Option<EnvironmentMapping> {
        self.environments
            .get(name)
            .map(|branch| EnvironmentMapping::new(name, branch))
    }

    /// The repository URL when one is set and non-blank.
    pub fn repository_url(&self) -> Option<&str> {
        self.repository_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

mod duration_text {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(text.trim()).map_err(serde::de::Error::custom)
    }
}

mod optional_duration_text {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    const DISABLED: &str = "off";

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => {
                serializer.serialize_str(&humantime::format_duration(*duration).to_string())
            }
            None => serializer.serialize_str(DISABLED),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let text = String::deserialize(deserializer)?;
        match text.trim() {
            "off" | "none" => Ok(None),
            other => humantime::parse_duration(other)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
