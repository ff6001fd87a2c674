//! Git plumbing for environment promotion.
//!
//! Every git invocation is a [`CommandRequest`] pushed through the process-wide
//! [`SerialQueue`], so no two commands ever touch a checkout at the same time.
//! The typed [`GitClient`] turns failed results into [`GitError`]s which the
//! evaluator, operator and reporter propagate with `?` and fold back into their
//! own result records.

mod client;
mod deploy;
mod history;
mod queue;
mod repository;
mod runner;
mod status;

pub use client::{remote_branch_ref, tag_ref, GitClient};
pub use deploy::{deployment_message, DeploymentOperator, ALREADY_UP_TO_DATE};
pub use history::{parse_log, CommitRange, CommitReporter, LOG_FORMAT};
pub use queue::{SerialQueue, DEFAULT_SETTLE_DELAY};
pub use repository::{authenticated_url, redact_url, RepositoryLocator, RepositoryManager};
pub use runner::{CommandRequest, CommandResult, CommandRunner, TokioCommandRunner};
pub use status::{classify_counts, StatusEvaluator};

/// Failure of one git step inside a multi-step operation.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("`{command}` failed: {message}")]
    CommandFailed { command: String, message: String },
    #[error("`{command}` produced unexpected output: {output}")]
    UnexpectedOutput { command: String, output: String },
}

impl GitError {
    /// The command line that failed.
    pub fn command(&self) -> &str {
        match self {
            GitError::CommandFailed { command, .. } => command,
            GitError::UnexpectedOutput { command, .. } => command,
        }
    }
}
