#![allow(clippy::result_large_err)]

//! Entry point tying settings, the command queue and the git operators
//! together. Each method is one user-facing operation: it returns its
//! result directly and mirrors it on the event stream when one is attached.

use crate::core::config::{ConfigValidator, Settings, SettingsStore};
use crate::core::error::AppError;
use crate::core::events::{DeployerEvent, EventSink};
use crate::core::git::{
    CommandResult, CommitRange, CommitReporter, DeploymentOperator, GitClient, RepositoryLocator,
    RepositoryManager, SerialQueue, StatusEvaluator,
};
use crate::core::types::ErrorCategory;
use git_deployer_types::{Commit, DeploymentResult, EnvironmentMapping, EnvironmentStatus};
use std::path::PathBuf;

pub struct Deployer {
    store: Box<dyn SettingsStore>,
    settings: Settings,
    locator: RepositoryLocator,
    queue: SerialQueue,
    events: Option<EventSink>,
}

impl Deployer {
    /// Load and validate settings, create the repositories directory and
    /// start the command queue. Must be called inside a tokio runtime.
    pub fn new(store: Box<dyn SettingsStore>, events: Option<EventSink>) -> Result<Self, AppError> {
        let settings = store.load()?;
        let queue = SerialQueue::new(
            settings.queue.settle_delay,
            settings.queue.command_timeout,
            events.clone(),
        );
        Self::with_queue(store, settings, queue, events)
    }

    /// Build around an existing queue, e.g. one backed by a custom runner.
    pub fn with_queue(
        store: Box<dyn SettingsStore>,
        settings: Settings,
        queue: SerialQueue,
        events: Option<EventSink>,
    ) -> Result<Self, AppError> {
        ConfigValidator::validate(&settings)?;
        let locator = locator_for(&settings)?;
        locator.ensure_base_dir()?;

        Ok(Self {
            store,
            settings,
            locator,
            queue,
            events,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Checkout directory for the configured repository URL.
    pub fn repository_path(&self) -> PathBuf {
        self.locator.resolve(self.settings.repository_url())
    }

    pub fn queue(&self) -> &SerialQueue {
        &self.queue
    }

    pub fn git(&self) -> GitClient {
        GitClient::new(
            self.queue.clone(),
            &self.repository_path(),
            &self.settings.remote,
        )
    }

    pub fn mapping(&self, name: &str) -> Result<EnvironmentMapping, AppError> {
        self.settings.mapping(name).ok_or_else(|| {
            AppError::new(
                ErrorCategory::ValidationError,
                format!("Unknown environment '{}'", name),
            )
            .with_context(format!(
                "configured environments: {}",
                self.settings
                    .environments
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
    }

    /// Clone the configured repository, or refresh an existing checkout.
    pub async fn initialize_repository(&self) -> Result<CommandResult, AppError> {
        let url = self.settings.repository_url().ok_or_else(|| {
            AppError::new(
                ErrorCategory::ConfigurationError,
                "No repository URL configured; run `git-deployer init --url <URL>`",
            )
        })?;

        let manager = RepositoryManager::new(self.queue.clone(), self.locator.clone());
        let result = manager.initialize(url, &self.settings.access_token).await;

        self.emit(DeployerEvent::RepositoryInitialized {
            succeeded: result.succeeded,
            error: (!result.succeeded).then(|| result.error_message()),
        });
        if result.succeeded {
            self.log("Repository initialized", false);
        } else {
            self.log(
                format!("Repository initialization failed: {}", result.error_message()),
                true,
            );
        }
        Ok(result)
    }

    pub async fn check_environment_status(
        &self,
        name: &str,
    ) -> Result<EnvironmentStatus, AppError> {
        let mapping = self.mapping(name)?;
        let status = StatusEvaluator::new(self.git()).evaluate(&mapping).await;
        if let Some(error) = &status.error {
            self.log(format!("Status check for {} failed: {}", name, error), true);
        }
        self.emit(DeployerEvent::StatusChecked {
            status: status.clone(),
        });
        Ok(status)
    }

    /// Status of every configured environment, in settings order.
    pub async fn check_all_environments(&self) -> Vec<EnvironmentStatus> {
        let mappings = self.settings.mappings();
        let statuses = StatusEvaluator::new(self.git())
            .evaluate_all(&mappings)
            .await;
        self.emit(DeployerEvent::AllEnvironmentsChecked {
            environments: statuses.clone(),
        });
        statuses
    }

    pub async fn deploy_environment(&self, name: &str) -> Result<DeploymentResult, AppError> {
        let mapping = self.mapping(name)?;
        self.log(format!("Deploying {} from {}", mapping.name, mapping.branch), false);

        let result = DeploymentOperator::new(self.git()).deploy(&mapping).await;
        match &result.error {
            Some(error) => self.log(format!("Deployment of {} failed: {}", name, error), true),
            None => self.log(format!("Deployed {}", name), false),
        }
        self.emit(DeployerEvent::Deployed {
            result: result.clone(),
        });
        Ok(result)
    }

    pub async fn deploy_all_outdated(&self) -> Vec<DeploymentResult> {
        let mappings = self.settings.mappings();
        self.log("Deploying all outdated environments", false);

        let results = DeploymentOperator::new(self.git())
            .deploy_all_outdated(&mappings)
            .await;
        for result in results.iter().filter(|r| r.is_failure()) {
            self.log(
                format!(
                    "Deployment of {} failed: {}",
                    result.name,
                    result.error.as_deref().unwrap_or_default()
                ),
                true,
            );
        }
        self.emit(DeployerEvent::AllOutdatedDeployed {
            deployments: results.clone(),
        });
        results
    }

    /// Commits between the environment's tag and its branch. Git failures
    /// are logged and reported as an empty list.
    pub async fn commits_between(
        &self,
        name: &str,
        range: CommitRange,
    ) -> Result<Vec<Commit>, AppError> {
        let mapping = self.mapping(name)?;
        let commits = match CommitReporter::new(self.git())
            .commits_between(&mapping, range)
            .await
        {
            Ok(commits) => commits,
            Err(err) => {
                let mut error = AppError::from(err);
                error.add_context("environment", name);
                tracing::error!(
                    environment = name,
                    code = %error.code,
                    command = error.context.get("command").map(String::as_str).unwrap_or_default(),
                    "Failed to list commits: {}",
                    error.message
                );
                self.log(format!("Failed to list commits for {}: {}", name, error.message), true);
                Vec::new()
            }
        };
        self.emit(DeployerEvent::CommitsRetrieved {
            environment: name.to_string(),
            commits: commits.clone(),
        });
        Ok(commits)
    }

    /// Reload settings from the store.
    pub fn load_settings(&mut self) -> Result<&Settings, AppError> {
        let settings = self.store.load()?;
        ConfigValidator::validate(&settings)?;
        self.locator = locator_for(&settings)?;
        self.settings = settings;
        Ok(&self.settings)
    }

    /// Validate and persist `settings`. When the repository URL changed, or
    /// its checkout does not exist yet, the repository is initialized and
    /// that result is returned.
    pub async fn save_settings(
        &mut self,
        settings: Settings,
    ) -> Result<Option<CommandResult>, AppError> {
        ConfigValidator::validate(&settings)?;
        let locator = locator_for(&settings)?;
        locator.ensure_base_dir()?;
        self.store.save(&settings)?;

        let url_changed = settings.repository_url() != self.settings.repository_url();
        self.settings = settings;
        self.locator = locator;
        self.emit(DeployerEvent::SettingsSaved);
        tracing::info!(?url_changed, "Settings saved");

        let checkout_missing = !self.repository_path().join(".git").exists();
        if self.settings.repository_url().is_some() && (url_changed || checkout_missing) {
            return self.initialize_repository().await.map(Some);
        }
        Ok(None)
    }

    /// Add or retarget one environment and persist the change.
    pub fn update_environment_mapping(&mut self, name: &str, branch: &str) -> Result<(), AppError> {
        ConfigValidator::validate_ref_name("environment name", name)?;
        ConfigValidator::validate_ref_name("branch", branch)?;

        let mut settings = self.settings.clone();
        settings
            .environments
            .insert(name.to_string(), branch.to_string());
        self.store.save(&settings)?;
        self.settings = settings;
        self.log(format!("Environment {} now tracks {}", name, branch), false);
        Ok(())
    }

    /// Remove one environment; its marker tag on the remote is left alone.
    pub fn remove_environment_mapping(&mut self, name: &str) -> Result<EnvironmentMapping, AppError> {
        let mapping = self.mapping(name)?;
        let mut settings = self.settings.clone();
        settings.environments.shift_remove(name);
        self.store.save(&settings)?;
        self.settings = settings;
        self.log(format!("Environment {} removed", name), false);
        Ok(mapping)
    }

    fn emit(&self, event: DeployerEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }

    fn log(&self, message: impl Into<String>, is_error: bool) {
        if let Some(events) = &self.events {
            events.log(message, is_error);
        }
    }
}

fn locator_for(settings: &Settings) -> Result<RepositoryLocator, AppError> {
    settings
        .repositories_dir
        .clone()
        .or_else(RepositoryLocator::default_base_dir)
        .map(RepositoryLocator::new)
        .ok_or_else(|| {
            AppError::new(
                ErrorCategory::ConfigurationError,
                "Cannot determine a repositories directory; set repositories_dir",
            )
        })
}
