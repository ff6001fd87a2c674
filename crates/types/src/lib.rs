//! Shared record types exchanged between the deployer core and its front ends.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A configured pairing of an environment name to the branch that feeds it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvironmentMapping {
    pub name: String,
    pub branch: String,
}

impl EnvironmentMapping {
    pub fn new(name: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            branch: branch.into(),
        }
    }
}

/// Relationship between an environment's marker tag and its branch tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentStatus {
    /// The tag points at the branch tip.
    UpToDate,
    /// The branch has commits the tag does not reach, or no tag exists yet.
    PendingCommits,
    /// The tag reaches commits the branch no longer contains.
    AheadOfBranch,
    Error,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::UpToDate => "up-to-date",
            DeploymentStatus::PendingCommits => "pending-commits",
            DeploymentStatus::AheadOfBranch => "ahead-of-branch",
            DeploymentStatus::Error => "error",
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived deployment state of one environment. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentStatus {
    pub name: String,
    pub branch: String,
    pub status: DeploymentStatus,
    /// Commit the marker tag points at; `None` iff the tag does not exist.
    pub last_deployed_commit: Option<String>,
    pub current_head_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EnvironmentStatus {
    /// Build an `error` status for `mapping` carrying `message`.
    pub fn failed(mapping: &EnvironmentMapping, message: impl Into<String>) -> Self {
        Self {
            name: mapping.name.clone(),
            branch: mapping.branch.clone(),
            status: DeploymentStatus::Error,
            last_deployed_commit: None,
            current_head_commit: None,
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == DeploymentStatus::Error
    }
}

/// One commit from the repository history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    pub full_hash: String,
    pub short_hash: String,
    /// First line of the commit message.
    pub message: String,
    pub author: String,
    /// Author date in ISO 8601.
    pub timestamp: String,
}

/// Outcome of promoting one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub name: String,
    pub deployed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeploymentResult {
    pub fn deployed(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            deployed: true,
            output: Some(output.into()),
            error: None,
        }
    }

    pub fn skipped(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            deployed: false,
            output: Some(output.into()),
            error: None,
        }
    }

    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            deployed: false,
            output: None,
            error: Some(error.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_kebab_case() {
        let status = EnvironmentStatus {
            name: "prod".to_string(),
            branch: "main".to_string(),
            status: DeploymentStatus::PendingCommits,
            last_deployed_commit: None,
            current_head_commit: Some("abc123".to_string()),
            error: None,
        };

        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["status"], "pending-commits");
        assert_eq!(value["lastDeployedCommit"], serde_json::Value::Null);
        assert_eq!(value["currentHeadCommit"], "abc123");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_failed_status_clears_commits() {
        let mapping = EnvironmentMapping::new("test", "release/test");
        let status = EnvironmentStatus::failed(&mapping, "fetch failed");
        assert!(status.is_error());
        assert_eq!(status.branch, "release/test");
        assert!(status.last_deployed_commit.is_none());
        assert_eq!(status.error.as_deref(), Some("fetch failed"));
    }

    #[test]
    fn test_display_matches_wire_name() {
        assert_eq!(DeploymentStatus::AheadOfBranch.to_string(), "ahead-of-branch");
        let parsed: DeploymentStatus = serde_json::from_str("\"up-to-date\"").unwrap();
        assert_eq!(parsed, DeploymentStatus::UpToDate);
    }

    #[test]
    fn test_deployment_result_constructors() {
        assert!(DeploymentResult::failed("prod", "push rejected").is_failure());
        let skipped = DeploymentResult::skipped("prod", "Environment is already up to date.");
        assert!(!skipped.deployed);
        assert!(!skipped.is_failure());
    }
}
