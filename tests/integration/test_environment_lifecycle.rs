use git_deployer::core::config::{MemorySettingsStore, QueueSettings, Settings};
use git_deployer::core::events::{DeployerEvent, EventSink};
use git_deployer::core::git::{CommitRange, ALREADY_UP_TO_DATE};
use git_deployer::core::Deployer;
use git_deployer_types::DeploymentStatus;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

fn configure_identity(dir: &Path) {
    git(dir, &["config", "user.email", "deployer@test.com"]);
    git(dir, &["config", "user.name", "Deployer Test"]);
}

/// Commit a file change in the seed clone and push `branch`; returns the new commit id.
fn push_commit(seed: &Path, branch: &str, message: &str) -> String {
    let file = seed.join("CHANGELOG");
    let previous = std::fs::read_to_string(&file).unwrap_or_default();
    std::fs::write(&file, format!("{}{}\n", previous, message)).unwrap();
    git(seed, &["add", "."]);
    git(seed, &["commit", "-m", message]);
    git(seed, &["push", "origin", branch]);
    git(seed, &["rev-parse", "HEAD"])
}

struct Fixture {
    _temp_dir: TempDir,
    remote: PathBuf,
    seed: PathBuf,
    deployer: Deployer,
    events: UnboundedReceiver<DeployerEvent>,
}

/// Bare remote with `main` holding one commit, a seed clone for pushing new
/// work, and a deployer whose checkout is cloned from the remote.
async fn fixture(environments: &[(&str, &str)]) -> (Fixture, String) {
    let temp_dir = TempDir::new().unwrap();
    let remote = temp_dir.path().join("remote.git");
    let seed = temp_dir.path().join("seed");
    std::fs::create_dir_all(&remote).unwrap();
    std::fs::create_dir_all(&seed).unwrap();

    git(&remote, &["init", "--bare"]);
    git(&remote, &["symbolic-ref", "HEAD", "refs/heads/main"]);

    git(&seed, &["init"]);
    configure_identity(&seed);
    git(&seed, &["checkout", "-b", "main"]);
    git(&seed, &["remote", "add", "origin", remote.to_str().unwrap()]);
    let first = push_commit(&seed, "main", "Initial release");

    let settings = Settings {
        repository_url: Some(remote.display().to_string()),
        repositories_dir: Some(temp_dir.path().join("repositories")),
        environments: environments
            .iter()
            .map(|(name, branch)| (name.to_string(), branch.to_string()))
            .collect::<IndexMap<_, _>>(),
        queue: QueueSettings {
            settle_delay: Duration::ZERO,
            command_timeout: Some(Duration::from_secs(60)),
        },
        ..Default::default()
    };

    let (sink, events) = EventSink::channel();
    let deployer = Deployer::new(Box::new(MemorySettingsStore::new(settings)), Some(sink)).unwrap();
    let initialized = deployer.initialize_repository().await.unwrap();
    assert!(initialized.succeeded, "clone failed: {}", initialized.error_message());
    configure_identity(&deployer.repository_path());

    (
        Fixture {
            _temp_dir: temp_dir,
            remote,
            seed,
            deployer,
            events,
        },
        first,
    )
}

fn drain(events: &mut UnboundedReceiver<DeployerEvent>) -> Vec<DeployerEvent> {
    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    received
}

#[tokio::test]
async fn test_deploy_then_new_commit_lifecycle() {
    let (fixture, abc) = fixture(&[("prod", "main")]).await;
    let deployer = &fixture.deployer;

    let before = deployer.check_environment_status("prod").await.unwrap();
    assert_eq!(before.status, DeploymentStatus::PendingCommits);
    assert_eq!(before.last_deployed_commit, None);
    assert_eq!(before.current_head_commit.as_deref(), Some(abc.as_str()));

    let deployed = deployer.deploy_environment("prod").await.unwrap();
    assert!(deployed.deployed, "deploy failed: {:?}", deployed.error);
    assert_eq!(
        git(&fixture.remote, &["rev-parse", "refs/tags/prod^{commit}"]),
        abc
    );

    let after = deployer.check_environment_status("prod").await.unwrap();
    assert_eq!(after.status, DeploymentStatus::UpToDate);
    assert_eq!(after.last_deployed_commit.as_deref(), Some(abc.as_str()));
    assert_eq!(after.current_head_commit.as_deref(), Some(abc.as_str()));

    // Redeploying with nothing new still succeeds.
    let again = deployer.deploy_environment("prod").await.unwrap();
    assert!(again.deployed, "redeploy failed: {:?}", again.error);
    let still = deployer.check_environment_status("prod").await.unwrap();
    assert_eq!(still.status, DeploymentStatus::UpToDate);

    let tag_message = git(
        &fixture.remote,
        &["for-each-ref", "--format=%(contents:subject)", "refs/tags/prod"],
    );
    assert!(tag_message.starts_with("Deployed to prod on "));

    let def = push_commit(&fixture.seed, "main", "Add checkout page");
    let pending = deployer.check_environment_status("prod").await.unwrap();
    assert_eq!(pending.status, DeploymentStatus::PendingCommits);
    assert_eq!(pending.last_deployed_commit.as_deref(), Some(abc.as_str()));
    assert_eq!(pending.current_head_commit.as_deref(), Some(def.as_str()));

    let commits = deployer
        .commits_between("prod", CommitRange::Pending)
        .await
        .unwrap();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].full_hash, def);
    assert_eq!(commits[0].message, "Add checkout page");
    assert_eq!(commits[0].author, "Deployer Test");
    assert!(def.starts_with(&commits[0].short_hash));
}

#[tokio::test]
async fn test_commits_between_without_tag_is_empty() {
    let (fixture, _) = fixture(&[("prod", "main")]).await;

    let commits = fixture
        .deployer
        .commits_between("prod", CommitRange::Pending)
        .await
        .unwrap();
    assert!(commits.is_empty());
}

#[tokio::test]
async fn test_reset_branch_is_ahead_and_not_auto_deployed() {
    let (fixture, abc) = fixture(&[("prod", "main")]).await;
    let deployer = &fixture.deployer;

    let def = push_commit(&fixture.seed, "main", "Risky change");
    assert!(deployer.deploy_environment("prod").await.unwrap().deployed);

    git(&fixture.seed, &["reset", "--hard", abc.as_str()]);
    git(&fixture.seed, &["push", "--force", "origin", "main"]);

    let status = deployer.check_environment_status("prod").await.unwrap();
    assert_eq!(status.status, DeploymentStatus::AheadOfBranch);
    assert_eq!(status.last_deployed_commit.as_deref(), Some(def.as_str()));
    assert_eq!(status.current_head_commit.as_deref(), Some(abc.as_str()));

    let ahead = deployer
        .commits_between("prod", CommitRange::Ahead)
        .await
        .unwrap();
    assert_eq!(ahead.len(), 1);
    assert_eq!(ahead[0].full_hash, def);
    assert!(deployer
        .commits_between("prod", CommitRange::Pending)
        .await
        .unwrap()
        .is_empty());

    let results = deployer.deploy_all_outdated().await;
    assert_eq!(results.len(), 1);
    assert!(!results[0].deployed);
    assert!(results[0].error.is_none());
    assert_eq!(
        git(&fixture.remote, &["rev-parse", "refs/tags/prod^{commit}"]),
        def
    );
}

#[tokio::test]
async fn test_explicit_deploy_after_reset_moves_tag_back() {
    let (fixture, abc) = fixture(&[("prod", "main")]).await;
    let deployer = &fixture.deployer;

    push_commit(&fixture.seed, "main", "Risky change");
    assert!(deployer.deploy_environment("prod").await.unwrap().deployed);

    git(&fixture.seed, &["reset", "--hard", abc.as_str()]);
    git(&fixture.seed, &["push", "--force", "origin", "main"]);
    assert_eq!(
        deployer.check_environment_status("prod").await.unwrap().status,
        DeploymentStatus::AheadOfBranch
    );

    let rolled_back = deployer.deploy_environment("prod").await.unwrap();
    assert!(rolled_back.deployed, "deploy failed: {:?}", rolled_back.error);
    assert_eq!(
        git(&fixture.remote, &["rev-parse", "refs/tags/prod^{commit}"]),
        abc
    );

    let status = deployer.check_environment_status("prod").await.unwrap();
    assert_eq!(status.status, DeploymentStatus::UpToDate);
    assert_eq!(status.last_deployed_commit.as_deref(), Some(abc.as_str()));
    assert_eq!(status.current_head_commit.as_deref(), Some(abc.as_str()));
}

#[tokio::test]
async fn test_deploy_after_reset_and_new_commit() {
    let (fixture, abc) = fixture(&[("prod", "main")]).await;
    let deployer = &fixture.deployer;

    let def = push_commit(&fixture.seed, "main", "Risky change");
    assert!(deployer.deploy_environment("prod").await.unwrap().deployed);

    git(&fixture.seed, &["reset", "--hard", abc.as_str()]);
    git(&fixture.seed, &["push", "--force", "origin", "main"]);
    let ghi = push_commit(&fixture.seed, "main", "Safer change");
    assert_ne!(ghi, def);

    let deployed = deployer.deploy_environment("prod").await.unwrap();
    assert!(deployed.deployed, "deploy failed: {:?}", deployed.error);
    assert_eq!(
        git(&fixture.remote, &["rev-parse", "refs/tags/prod^{commit}"]),
        ghi
    );
    assert_eq!(
        git(&deployer.repository_path(), &["rev-parse", "HEAD"]),
        ghi
    );

    let status = deployer.check_environment_status("prod").await.unwrap();
    assert_eq!(status.status, DeploymentStatus::UpToDate);
    assert_eq!(status.last_deployed_commit.as_deref(), Some(ghi.as_str()));

    // A later commit on the rewritten branch deploys normally.
    let jkl = push_commit(&fixture.seed, "main", "Follow-up fix");
    let results = deployer.deploy_all_outdated().await;
    assert!(results[0].deployed, "deploy failed: {:?}", results[0].error);
    assert_eq!(
        git(&fixture.remote, &["rev-parse", "refs/tags/prod^{commit}"]),
        jkl
    );
}

#[tokio::test]
async fn test_deploy_all_outdated_only_moves_pending_environments() {
    let (mut fixture, _) = fixture(&[("prod", "main"), ("dev-test", "develop")]).await;

    git(&fixture.seed, &["checkout", "-b", "develop"]);
    let develop_tip = push_commit(&fixture.seed, "develop", "Work in progress");

    assert!(fixture.deployer.deploy_environment("prod").await.unwrap().deployed);
    drain(&mut fixture.events);

    let results = fixture.deployer.deploy_all_outdated().await;
    assert_eq!(results.len(), 2);

    assert_eq!(results[0].name, "prod");
    assert!(!results[0].deployed);
    assert_eq!(results[0].output.as_deref(), Some(ALREADY_UP_TO_DATE));

    assert_eq!(results[1].name, "dev-test");
    assert!(results[1].deployed, "dev-test failed: {:?}", results[1].error);
    assert_eq!(
        git(&fixture.remote, &["rev-parse", "refs/tags/dev-test^{commit}"]),
        develop_tip
    );

    let events = drain(&mut fixture.events);
    assert!(events.iter().any(|event| matches!(
        event,
        DeployerEvent::AllOutdatedDeployed { deployments } if deployments == &results
    )));
    assert!(events.iter().any(|event| matches!(
        event,
        DeployerEvent::LogMessage { message, is_error: false }
            if message.starts_with("Executing command:")
    )));

    let statuses = fixture.deployer.check_all_environments().await;
    assert!(statuses
        .iter()
        .all(|status| status.status == DeploymentStatus::UpToDate));
}

#[tokio::test]
async fn test_missing_branch_reports_error_status() {
    let (fixture, _) = fixture(&[("prod", "main"), ("qa", "release/qa")]).await;

    let statuses = fixture.deployer.check_all_environments().await;
    assert_eq!(statuses[0].status, DeploymentStatus::PendingCommits);
    assert_eq!(statuses[1].status, DeploymentStatus::Error);
    assert!(statuses[1].error.as_deref().unwrap().contains("release/qa"));

    let failed = fixture.deployer.deploy_environment("qa").await.unwrap();
    assert!(!failed.deployed);
    assert!(failed.is_failure());
}

#[tokio::test]
async fn test_initialize_existing_checkout_fetches() {
    let (fixture, _) = fixture(&[("prod", "main")]).await;

    let refreshed = fixture.deployer.initialize_repository().await.unwrap();
    assert!(refreshed.succeeded, "fetch failed: {}", refreshed.error_message());
    assert!(fixture.deployer.repository_path().join(".git").is_dir());
}
