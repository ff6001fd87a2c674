use super::queue::SerialQueue;
use super::runner::{CommandRequest, CommandResult};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

const DEFAULT_REPOSITORY_NAME: &str = "default-repo";
const FINGERPRINT_LEN: usize = 8;

/// Maps repository URLs to checkout directories under one base directory.
#[derive(Debug, Clone)]
pub struct RepositoryLocator {
    base_dir: PathBuf,
}

impl RepositoryLocator {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// `~/.git-deployer/repositories`, or `None` when no home directory is known.
    pub fn default_base_dir() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".git-deployer").join("repositories"))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Checkout directory for `repository_url`: `<name>-<fingerprint>`, or the
    /// fixed default directory when no URL is configured.
    pub fn resolve(&self, repository_url: Option<&str>) -> PathBuf {
        match repository_url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(url) => self
                .base_dir
                .join(format!("{}-{}", repository_name(url), fingerprint(url))),
            None => self.base_dir.join(DEFAULT_REPOSITORY_NAME),
        }
    }

    pub fn ensure_base_dir(&self) -> Result<(), AppError> {
        if self.base_dir.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(&self.base_dir).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!(
                    "Failed to create base repository directory {}: {}",
                    self.base_dir.display(),
                    e
                ),
            )
        })?;
        tracing::info!(path = %self.base_dir.display(), "Created base repository directory");
        Ok(())
    }
}

/// Last non-empty path segment without `.git`, restricted to filesystem-safe
/// characters.
fn repository_name(url: &str) -> String {
    let segment = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string),
        // scp-like `git@host:org/repo.git` or a plain path
        Err(_) => url
            .split(['/', '\\', ':'])
            .filter(|s| !s.is_empty())
            .last()
            .map(str::to_string),
    };

    let name: String = segment
        .as_deref()
        .map(|s| s.strip_suffix(".git").unwrap_or(s))
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if name.is_empty() || name.chars().all(|c| c == '.') {
        DEFAULT_REPOSITORY_NAME.to_string()
    } else {
        name
    }
}

fn fingerprint(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(digest)[..FINGERPRINT_LEN].to_string()
}

/// Embed `token` as userinfo for http(s) URLs; other URLs pass through.
pub fn authenticated_url(url: &str, token: &str) -> String {
    if token.is_empty() {
        return url.to_string();
    }
    match Url::parse(url) {
        Ok(mut parsed) if matches!(parsed.scheme(), "http" | "https") => {
            if parsed.set_username(token).is_err() {
                return url.to_string();
            }
            parsed.to_string()
        }
        _ => url.to_string(),
    }
}

/// Strip any userinfo so the URL is safe to log.
pub fn redact_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if parsed.has_authority() => {
            let _ = parsed.set_username("");
            let _ = parsed.set_password(None);
            parsed.to_string()
        }
        _ => url.to_string(),
    }
}

/// `git clone <url> .` with the token embedded in the URL but masked in
/// everything the queue logs or returns.
fn clone_request(url: &str, token: &str, repo_path: &Path) -> CommandRequest {
    let source = authenticated_url(url, token);
    let encoded = Url::parse(&source)
        .map(|parsed| parsed.username().to_string())
        .unwrap_or_default();
    CommandRequest::git(["clone", source.as_str(), "."], repo_path)
        .redacting(&encoded)
        .redacting(token)
}

/// Clones or refreshes the checkout for the configured repository.
#[derive(Clone)]
pub struct RepositoryManager {
    queue: SerialQueue,
    locator: RepositoryLocator,
}

impl RepositoryManager {
    pub fn new(queue: SerialQueue, locator: RepositoryLocator) -> Self {
        Self { queue, locator }
    }

    /// Clone `url` into its checkout directory, or fetch when it is already a
    /// repository. Returns the last command's result.
    pub async fn initialize(&self, url: &str, token: &str) -> CommandResult {
        let repo_path = self.locator.resolve(Some(url));
        tracing::info!(url = %redact_url(url), path = %repo_path.display(), "Initializing repository");

        if !repo_path.exists() {
            tracing::info!(path = %repo_path.display(), "Creating repository directory");
            if let Err(e) = fs::create_dir_all(&repo_path) {
                return CommandResult::failure(format!(
                    "Failed to create repository directory {}: {}",
                    repo_path.display(),
                    e
                ));
            }
        }

        let result = if repo_path.join(".git").exists() {
            tracing::info!("Repository already exists, fetching latest changes");
            let tags = self
                .queue
                .submit(CommandRequest::git(["fetch", "--tags", "--force"], &repo_path))
                .await;
            if !tags.succeeded {
                return tags;
            }
            self.queue
                .submit(CommandRequest::git(["fetch", "--all"], &repo_path))
                .await
        } else {
            tracing::info!("Cloning repository for the first time");
            self.queue.submit(clone_request(url, token, &repo_path)).await
        };

        if result.succeeded {
            tracing::info!("Repository initialization completed successfully");
        } else {
            tracing::error!("Repository initialization failed: {}", result.error_message());
        }
        result
    }
}
