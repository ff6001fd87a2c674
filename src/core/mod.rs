pub mod config;
pub mod deployer;
pub mod error;
pub mod events;
pub mod git;
pub mod types;

pub use config::{ConfigLoader, ConfigValidator, Settings, SettingsStore, TomlSettingsStore};
pub use deployer::Deployer;
pub use error::AppError;
pub use events::{DeployerEvent, EventSink};
pub use types::*;
