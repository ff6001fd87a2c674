use super::client::{remote_branch_ref, tag_ref, GitClient};
use super::GitError;
use chrono::DateTime;
use git_deployer_types::{Commit, EnvironmentMapping};

const FIELD_SEPARATOR: char = '\u{1f}';
const RECORD_SEPARATOR: char = '\u{1e}';
const UNKNOWN: &str = "unknown";

/// Full hash, short hash, subject, author name, strict ISO 8601 author date;
/// fields split by US (0x1f), records terminated by RS (0x1e).
pub const LOG_FORMAT: &str = "--pretty=format:%H%x1f%h%x1f%s%x1f%an%x1f%aI%x1e";

/// Which side of the tag/branch relationship to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitRange {
    /// On the branch tip but not yet tagged.
    #[default]
    Pending,
    /// Tagged but no longer on the branch.
    Ahead,
}

/// Lists commits between an environment's marker tag and its branch tip.
#[derive(Clone)]
pub struct CommitReporter {
    git: GitClient,
}

impl CommitReporter {
    pub fn new(git: GitClient) -> Self {
        Self { git }
    }

    /// Newest-first commits in `range`; empty when the environment has never
    /// been deployed.
    pub async fn commits_between(
        &self,
        mapping: &EnvironmentMapping,
        range: CommitRange,
    ) -> Result<Vec<Commit>, GitError> {
        self.git.fetch_all().await?;

        if !self.git.tag_exists(&mapping.name).await? {
            tracing::debug!(environment = %mapping.name, "No marker tag; nothing to compare against");
            return Ok(Vec::new());
        }

        let tag = format!("{}^{{commit}}", tag_ref(&mapping.name));
        let tip = remote_branch_ref(self.git.remote(), &mapping.branch);
        let (from, to) = match range {
            CommitRange::Pending => (tag, tip),
            CommitRange::Ahead => (tip, tag),
        };

        let output = self.git.log_range(&from, &to, LOG_FORMAT).await?;
        let commits = parse_log(&output);
        tracing::debug!(environment = %mapping.name, count = commits.len(), "Retrieved commits");
        Ok(commits)
    }
}

/// Parse [`LOG_FORMAT`] output. A malformed record becomes a placeholder
/// commit instead of discarding the batch.
pub fn parse_log(output: &str) -> Vec<Commit> {
    output
        .split(RECORD_SEPARATOR)
        .map(|chunk| chunk.trim_matches(|c| c == '\n' || c == '\r'))
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| {
            parse_record(chunk).unwrap_or_else(|reason| {
                tracing::warn!(record = %chunk, "Failed to parse commit record: {}", reason);
                placeholder(&reason)
            })
        })
        .collect()
}

fn parse_record(chunk: &str) -> Result<Commit, String> {
    let fields: Vec<&str> = chunk.split(FIELD_SEPARATOR).collect();
    let [full_hash, short_hash, message, author, timestamp] = fields.as_slice() else {
        return Err(format!("expected 5 fields, found {}", fields.len()));
    };

    if full_hash.is_empty() || !full_hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("invalid commit hash '{}'", full_hash));
    }
    DateTime::parse_from_rfc3339(timestamp)
        .map_err(|e| format!("invalid timestamp '{}': {}", timestamp, e))?;

    Ok(Commit {
        full_hash: full_hash.to_string(),
        short_hash: short_hash.to_string(),
        message: message.to_string(),
        author: author.to_string(),
        timestamp: timestamp.to_string(),
    })
}

fn placeholder(reason: &str) -> Commit {
    Commit {
        full_hash: UNKNOWN.to_string(),
        short_hash: UNKNOWN.to_string(),
        message: format!("<unparseable commit record: {}>", reason),
        author: UNKNOWN.to_string(),
        timestamp: UNKNOWN.to_string(),
    }
}
