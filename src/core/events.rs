//! Typed events surfaced to whatever front end renders deployer activity.

use git_deployer_types::{Commit, DeploymentResult, EnvironmentStatus};
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum DeployerEvent {
    StatusChecked {
        status: EnvironmentStatus,
    },
    AllEnvironmentsChecked {
        environments: Vec<EnvironmentStatus>,
    },
    Deployed {
        result: DeploymentResult,
    },
    AllOutdatedDeployed {
        deployments: Vec<DeploymentResult>,
    },
    CommitsRetrieved {
        environment: String,
        commits: Vec<Commit>,
    },
    RepositoryInitialized {
        succeeded: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    SettingsSaved,
    LogMessage {
        message: String,
        is_error: bool,
    },
}

/// Sending half of the event stream. Cloning is cheap; a dropped receiver
/// silently discards further events.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: UnboundedSender<DeployerEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, UnboundedReceiver<DeployerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: DeployerEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event receiver dropped; discarding event");
        }
    }

    pub fn log(&self, message: impl Into<String>, is_error: bool) {
        self.emit(DeployerEvent::LogMessage {
            message: message.into(),
            is_error,
        });
    }
}
