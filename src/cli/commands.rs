use crate::{
    cli::args::{CommitsArgs, DeployArgs, EnvArgs, EnvCommand, GlobalArgs, InitArgs, StatusArgs},
    core::{
        git::{CommandResult, CommitRange},
        ConfigLoader, Deployer, OutputFormat, TomlSettingsStore,
    },
    Result,
};
use anyhow::Context;
use git_deployer_types::{Commit, DeploymentResult, EnvironmentStatus};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

const SHORT_HASH_LEN: usize = 7;

/// Settings file named by `--config`, else the default location.
pub fn settings_path(global: &GlobalArgs) -> Result<PathBuf> {
    match &global.config {
        Some(path) => Ok(path.clone()),
        None => Ok(ConfigLoader::default_path()?),
    }
}

fn open(global: &GlobalArgs) -> Result<Deployer> {
    let path = settings_path(global)?;
    tracing::debug!(path = %path.display(), "Loading settings");
    let deployer = Deployer::new(Box::new(TomlSettingsStore::new(path)), None)?;
    Ok(deployer)
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered =
        serde_json::to_string_pretty(value).context("failed to serialize command output")?;
    println!("{}", rendered);
    Ok(())
}

pub async fn init(global: &GlobalArgs, args: InitArgs) -> Result<ExitCode> {
    let mut deployer = open(global)?;

    let mut settings = deployer.settings().clone();
    if let Some(url) = args.url {
        settings.repository_url = Some(url);
    }
    if let Some(token) = args.token {
        settings.access_token = token;
    }

    let result = match deployer.save_settings(settings).await? {
        Some(result) => result,
        None => deployer.initialize_repository().await?,
    };

    match global.format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text => print_init(&deployer, &result),
    }
    Ok(exit_code(result.succeeded))
}

fn print_init(deployer: &Deployer, result: &CommandResult) {
    if result.succeeded {
        println!(
            "Repository ready at {}",
            deployer.repository_path().display()
        );
    } else {
        println!("Repository initialization failed: {}", result.error_message());
    }
}

pub async fn status(global: &GlobalArgs, args: StatusArgs) -> Result<ExitCode> {
    let deployer = open(global)?;

    let statuses = match args.environment {
        Some(name) => vec![deployer.check_environment_status(&name).await?],
        None => deployer.check_all_environments().await,
    };

    match global.format {
        OutputFormat::Json => print_json(&statuses)?,
        OutputFormat::Text => print_statuses(&statuses),
    }
    Ok(exit_code(statuses.iter().all(|s| !s.is_error())))
}

fn print_statuses(statuses: &[EnvironmentStatus]) {
    if statuses.is_empty() {
        println!("No environments configured.");
        return;
    }

    let name_width = column_width(statuses.iter().map(|s| s.name.as_str()), "ENVIRONMENT");
    let branch_width = column_width(statuses.iter().map(|s| s.branch.as_str()), "BRANCH");
    println!(
        "{:<name_width$}  {:<branch_width$}  {:<15}  {:<8}  {:<8}",
        "ENVIRONMENT", "BRANCH", "STATUS", "DEPLOYED", "HEAD"
    );

    for status in statuses {
        println!(
            "{:<name_width$}  {:<branch_width$}  {:<15}  {:<8}  {:<8}",
            status.name,
            status.branch,
            status.status.as_str(),
            short(status.last_deployed_commit.as_deref()),
            short(status.current_head_commit.as_deref()),
        );
        if let Some(error) = &status.error {
            println!("    error: {}", first_line(error));
        }
    }
}

pub async fn deploy(global: &GlobalArgs, args: DeployArgs) -> Result<ExitCode> {
    let deployer = open(global)?;

    let results = match args.environment {
        Some(name) if !args.all_outdated => vec![deployer.deploy_environment(&name).await?],
        _ => deployer.deploy_all_outdated().await,
    };

    match global.format {
        OutputFormat::Json => print_json(&results)?,
        OutputFormat::Text => print_deployments(&results),
    }
    Ok(exit_code(results.iter().all(|r| !r.is_failure())))
}

fn print_deployments(results: &[DeploymentResult]) {
    for result in results {
        if let Some(error) = &result.error {
            println!("{}: failed: {}", result.name, first_line(error));
        } else if result.deployed {
            println!("{}: deployed", result.name);
            for line in result
                .output
                .as_deref()
                .unwrap_or_default()
                .lines()
                .filter(|l| !l.trim().is_empty())
            {
                println!("    {}", line);
            }
        } else {
            println!(
                "{}: skipped: {}",
                result.name,
                result.output.as_deref().unwrap_or_default()
            );
        }
    }
}

pub async fn commits(global: &GlobalArgs, args: CommitsArgs) -> Result<ExitCode> {
    let deployer = open(global)?;
    let range = if args.ahead {
        CommitRange::Ahead
    } else {
        CommitRange::Pending
    };

    let commits = deployer.commits_between(&args.environment, range).await?;

    match global.format {
        OutputFormat::Json => print_json(&commits)?,
        OutputFormat::Text => print_commits(&commits),
    }
    Ok(ExitCode::SUCCESS)
}

fn print_commits(commits: &[Commit]) {
    if commits.is_empty() {
        println!("No commits.");
        return;
    }
    let author_width = column_width(commits.iter().map(|c| c.author.as_str()), "");
    for commit in commits {
        println!(
            "{}  {}  {:<author_width$}  {}",
            commit.short_hash, commit.timestamp, commit.author, commit.message
        );
    }
}

pub fn env(global: &GlobalArgs, args: EnvArgs) -> Result<ExitCode> {
    let mut deployer = open(global)?;

    match args.command {
        EnvCommand::List => {}
        EnvCommand::Set { name, branch } => {
            deployer.update_environment_mapping(&name, &branch)?;
        }
        EnvCommand::Remove { name } => {
            deployer.remove_environment_mapping(&name)?;
        }
    }

    let mappings = deployer.settings().mappings();
    match global.format {
        OutputFormat::Json => print_json(&mappings)?,
        OutputFormat::Text => {
            let width = column_width(mappings.iter().map(|m| m.name.as_str()), "");
            for mapping in &mappings {
                println!("{:<width$}  {}", mapping.name, mapping.branch);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub fn path(global: &GlobalArgs) -> Result<ExitCode> {
    let deployer = open(global)?;
    let path = deployer.repository_path();

    match global.format {
        OutputFormat::Json => print_json(&serde_json::json!({ "path": path }))?,
        OutputFormat::Text => println!("{}", path.display()),
    }
    Ok(ExitCode::SUCCESS)
}

fn column_width<'a>(values: impl Iterator<Item = &'a str>, header: &str) -> usize {
    values.map(str::len).chain([header.len()]).max().unwrap_or(0)
}

fn short(hash: Option<&str>) -> &str {
    match hash {
        Some(hash) => &hash[..hash.len().min(SHORT_HASH_LEN)],
        None => "-",
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or(text)
}
