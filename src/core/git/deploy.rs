use super::client::GitClient;
use super::status::StatusEvaluator;
use super::GitError;
use chrono::{DateTime, SecondsFormat, Utc};
use git_deployer_types::{DeploymentResult, DeploymentStatus, EnvironmentMapping};

pub const ALREADY_UP_TO_DATE: &str = "Environment is already up to date.";
const AHEAD_OF_BRANCH_SKIPPED: &str =
    "Environment is ahead of its branch; the tag is not moved automatically.";

/// Annotation written into every marker tag.
pub fn deployment_message(environment: &str, at: DateTime<Utc>) -> String {
    format!(
        "Deployed to {} on {}",
        environment,
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

/// Moves an environment's marker tag to the tip of its branch and pushes it.
///
/// The tag is always deleted (locally and on the remote) before it is
/// recreated, never force-moved. Each attempt is all-or-nothing: the first
/// failing step ends it and later steps are skipped.
#[derive(Clone)]
pub struct DeploymentOperator {
    git: GitClient,
    evaluator: StatusEvaluator,
}

impl DeploymentOperator {
    pub fn new(git: GitClient) -> Self {
        let evaluator = StatusEvaluator::new(git.clone());
        Self { git, evaluator }
    }

    pub async fn deploy(&self, mapping: &EnvironmentMapping) -> DeploymentResult {
        let outcome = match self.git.fetch_all().await {
            Ok(()) => self.promote(mapping).await,
            Err(err) => Err(err),
        };
        into_result(mapping, outcome)
    }

    /// Promote every environment with pending commits after one shared fetch.
    pub async fn deploy_all_outdated(
        &self,
        mappings: &[EnvironmentMapping],
    ) -> Vec<DeploymentResult> {
        if let Err(err) = self.git.fetch_all().await {
            let message = err.to_string();
            return mappings
                .iter()
                .map(|mapping| DeploymentResult::failed(&mapping.name, message.clone()))
                .collect();
        }

        let mut results = Vec::with_capacity(mappings.len());
        for mapping in mappings {
            let status = self.evaluator.classify(mapping).await;
            let result = match status.status {
                DeploymentStatus::PendingCommits => {
                    into_result(mapping, self.promote(mapping).await)
                }
                DeploymentStatus::UpToDate => {
                    DeploymentResult::skipped(&mapping.name, ALREADY_UP_TO_DATE)
                }
                DeploymentStatus::AheadOfBranch => {
                    DeploymentResult::skipped(&mapping.name, AHEAD_OF_BRANCH_SKIPPED)
                }
                DeploymentStatus::Error => DeploymentResult::failed(
                    &mapping.name,
                    status.error.unwrap_or_else(|| "status check failed".to_string()),
                ),
            };
            results.push(result);
        }
        results
    }

    /// Check out the fetched branch tip, replace the tag and push it. Assumes
    /// refs were just fetched.
    async fn promote(&self, mapping: &EnvironmentMapping) -> Result<String, GitError> {
        let tag = mapping.name.as_str();
        tracing::info!(environment = tag, branch = %mapping.branch, "Deploying environment");

        self.git.checkout_remote_tip(&mapping.branch).await?;

        if self.git.tag_exists(tag).await? {
            self.git.delete_local_tag(tag).await?;
            self.git.delete_remote_tag(tag).await?;
        }

        self.git
            .create_annotated_tag(tag, &deployment_message(tag, Utc::now()))
            .await?;
        let pushed = self.git.push_tag(tag).await?;

        tracing::info!(environment = tag, "Deployment pushed");
        Ok(pushed.combined_output())
    }
}

fn into_result(
    mapping: &EnvironmentMapping,
    outcome: Result<String, GitError>,
) -> DeploymentResult {
    match outcome {
        Ok(output) => DeploymentResult::deployed(&mapping.name, output),
        Err(err) => {
            tracing::error!(environment = %mapping.name, error = %err, "Deployment failed");
            DeploymentResult::failed(&mapping.name, err.to_string())
        }
    }
}
