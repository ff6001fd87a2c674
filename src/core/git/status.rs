use super::client::{remote_branch_ref, tag_ref, GitClient};
use super::GitError;
use git_deployer_types::{DeploymentStatus, EnvironmentMapping, EnvironmentStatus};

/// Status implied by the presence of a marker tag and the commit counts in
/// both directions between the tag and the branch tip.
pub fn classify_counts(tag_present: bool, pending: u64, ahead: u64) -> DeploymentStatus {
    if !tag_present || pending > 0 {
        DeploymentStatus::PendingCommits
    } else if ahead > 0 {
        DeploymentStatus::AheadOfBranch
    } else {
        DeploymentStatus::UpToDate
    }
}

/// Computes where each environment's marker tag stands relative to its branch.
///
/// Reads only remote-tracking refs and tags, never the working tree, so status
/// checks leave the checkout on whatever branch it was on.
#[derive(Clone)]
pub struct StatusEvaluator {
    git: GitClient,
}

impl StatusEvaluator {
    pub fn new(git: GitClient) -> Self {
        Self { git }
    }

    /// Fetch, then classify `mapping`. Never fails; problems become an
    /// `error` status.
    pub async fn evaluate(&self, mapping: &EnvironmentMapping) -> EnvironmentStatus {
        if let Err(err) = self.git.fetch_all().await {
            return EnvironmentStatus::failed(mapping, err.to_string());
        }
        self.classify(mapping).await
    }

    /// One shared fetch, then classify every mapping in order.
    pub async fn evaluate_all(&self, mappings: &[EnvironmentMapping]) -> Vec<EnvironmentStatus> {
        if let Err(err) = self.git.fetch_all().await {
            let message = err.to_string();
            return mappings
                .iter()
                .map(|mapping| EnvironmentStatus::failed(mapping, message.clone()))
                .collect();
        }

        let mut statuses = Vec::with_capacity(mappings.len());
        for mapping in mappings {
            statuses.push(self.classify(mapping).await);
        }
        statuses
    }

    /// Classify against already-fetched refs.
    pub async fn classify(&self, mapping: &EnvironmentMapping) -> EnvironmentStatus {
        match self.inspect(mapping).await {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(environment = %mapping.name, error = %err, "Status check failed");
                EnvironmentStatus::failed(mapping, err.to_string())
            }
        }
    }

    async fn inspect(&self, mapping: &EnvironmentMapping) -> Result<EnvironmentStatus, GitError> {
        let head = self.git.remote_branch_tip(&mapping.branch).await?;

        if !self.git.tag_exists(&mapping.name).await? {
            return Ok(EnvironmentStatus {
                name: mapping.name.clone(),
                branch: mapping.branch.clone(),
                status: classify_counts(false, 0, 0),
                last_deployed_commit: None,
                current_head_commit: Some(head),
                error: None,
            });
        }

        let deployed = self.git.tag_target(&mapping.name).await?;
        let tag = tag_ref(&mapping.name);
        let tip = remote_branch_ref(self.git.remote(), &mapping.branch);

        let pending = self.git.count_commits(&tag, &tip).await?;
        // Only worth asking when nothing is pending.
        let ahead = if pending == 0 {
            self.git.count_commits(&tip, &tag).await?
        } else {
            0
        };

        let status = classify_counts(true, pending, ahead);
        tracing::debug!(
            environment = %mapping.name,
            pending,
            ahead,
            status = %status,
            "Classified environment"
        );

        Ok(EnvironmentStatus {
            name: mapping.name.clone(),
            branch: mapping.branch.clone(),
            status,
            last_deployed_commit: Some(deployed),
            current_head_commit: Some(head),
            error: None,
        })
    }
}
