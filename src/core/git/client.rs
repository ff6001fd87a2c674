use super::queue::SerialQueue;
use super::runner::{CommandRequest, CommandResult};
use super::GitError;
use std::path::{Path, PathBuf};

/// Fully qualified remote-tracking ref for `branch`.
pub fn remote_branch_ref(remote: &str, branch: &str) -> String {
    format!("refs/remotes/{}/{}", remote, branch)
}

/// Fully qualified ref for the marker tag `tag`.
pub fn tag_ref(tag: &str) -> String {
    format!("refs/tags/{}", tag)
}

/// Typed git operations against one checkout, all routed through the queue.
#[derive(Clone)]
pub struct GitClient {
    queue: SerialQueue,
    repo_path: PathBuf,
    remote: String,
}

impl GitClient {
    pub fn new(queue: SerialQueue, repo_path: &Path, remote: &str) -> Self {
        Self {
            queue,
            repo_path: repo_path.to_path_buf(),
            remote: remote.to_string(),
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Run a git command, turning a failed result into [`GitError::CommandFailed`].
    pub async fn run<I, S>(&self, args: I) -> Result<CommandResult, GitError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let request = CommandRequest::git(args, &self.repo_path);
        let command = request.display();
        let result = self.queue.submit(request).await;
        if result.succeeded {
            Ok(result)
        } else {
            Err(GitError::CommandFailed {
                command,
                message: result.error_message(),
            })
        }
    }

    async fn run_stdout<I, S>(&self, args: I) -> Result<String, GitError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(self.run(args).await?.stdout.trim().to_string())
    }

    /// Fetch every remote branch and tag, overwriting local tags.
    pub async fn fetch_all(&self) -> Result<(), GitError> {
        self.run(["fetch", "--all", "--tags", "--force"]).await?;
        Ok(())
    }

    /// Commit id at the tip of `branch` on the remote-tracking ref.
    pub async fn remote_branch_tip(&self, branch: &str) -> Result<String, GitError> {
        self.resolve_commit(&remote_branch_ref(&self.remote, branch))
            .await
    }

    pub async fn tag_exists(&self, tag: &str) -> Result<bool, GitError> {
        let listed = self.run_stdout(["tag", "-l", tag]).await?;
        Ok(listed.lines().any(|line| line.trim() == tag))
    }

    /// Commit an annotated tag points at, not the tag object itself.
    pub async fn tag_target(&self, tag: &str) -> Result<String, GitError> {
        self.resolve_commit(&tag_ref(tag)).await
    }

    async fn resolve_commit(&self, reference: &str) -> Result<String, GitError> {
        let spec = format!("{}^{{commit}}", reference);
        let command = format!("git rev-parse --verify {}", spec);
        let commit = self.run_stdout(["rev-parse", "--verify", spec.as_str()]).await?;
        if commit.is_empty() {
            return Err(GitError::UnexpectedOutput {
                command,
                output: commit,
            });
        }
        Ok(commit)
    }

    /// Number of commits reachable from `to` but not from `from`.
    pub async fn count_commits(&self, from: &str, to: &str) -> Result<u64, GitError> {
        let range = format!("{}..{}", from, to);
        let output = self
            .run_stdout(["rev-list", "--count", range.as_str()])
            .await?;
        output
            .parse::<u64>()
            .map_err(|_| GitError::UnexpectedOutput {
                command: format!("git rev-list --count {}", range),
                output,
            })
    }

    /// Check out `branch` with the local ref reset to the remote-tracking tip,
    /// so a branch that was reset or rebased upstream is followed exactly.
    pub async fn checkout_remote_tip(&self, branch: &str) -> Result<(), GitError> {
        let tip = remote_branch_ref(&self.remote, branch);
        self.run(["checkout", "-B", branch, tip.as_str()]).await?;
        Ok(())
    }

    pub async fn delete_local_tag(&self, tag: &str) -> Result<(), GitError> {
        self.run(["tag", "-d", tag]).await?;
        Ok(())
    }

    /// Delete `tag` on the remote. A tag the remote never had counts as deleted.
    pub async fn delete_remote_tag(&self, tag: &str) -> Result<(), GitError> {
        let refspec = format!(":{}", tag_ref(tag));
        match self.run(["push", self.remote.as_str(), refspec.as_str()]).await {
            Ok(_) => Ok(()),
            Err(GitError::CommandFailed { message, .. })
                if message.contains("remote ref does not exist") =>
            {
                tracing::info!(tag, "Remote tag already absent");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub async fn create_annotated_tag(&self, tag: &str, message: &str) -> Result<(), GitError> {
        self.run(["tag", "-a", tag, "-m", message]).await?;
        Ok(())
    }

    pub async fn push_tag(&self, tag: &str) -> Result<CommandResult, GitError> {
        let refspec = tag_ref(tag);
        self.run(["push", self.remote.as_str(), refspec.as_str()])
            .await
    }

    /// Raw `git log from..to` output in the given pretty format.
    pub async fn log_range(&self, from: &str, to: &str, format: &str) -> Result<String, GitError> {
        let range = format!("{}..{}", from, to);
        Ok(self.run(["log", format, range.as_str()]).await?.stdout)
    }
}
