pub mod args;
pub mod commands;

pub use args::{CommitsArgs, DeployArgs, EnvArgs, EnvCommand, GlobalArgs, InitArgs, StatusArgs};
use clap::{Parser, Subcommand};
use std::process::ExitCode;

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
DEPLOYMENT COMMANDS:\n{subcommands}\n";

#[derive(Parser)]
#[command(name = "git-deployer")]
#[command(version = crate::VERSION)]
#[command(about = "Track which commit each environment runs and promote branches with marker tags")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: init with a repository URL, check status, inspect pending commits, then deploy."
)]
pub struct Args {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(
        about = "Save repository settings and clone or refresh the checkout",
        long_about = "Init stores the repository URL and access token, then clones the repository into its checkout directory or fetches when the checkout already exists.",
        after_help = "Example:\n    git-deployer init --url https://github.com/acme/storefront.git --token ghp_xxx"
    )]
    Init(InitArgs),
    #[command(
        about = "Compare environment tags with their branches",
        long_about = "Status fetches once, then reports each environment as up-to-date, pending-commits, ahead-of-branch or error without touching the working tree.",
        after_help = "Examples:\n    git-deployer status\n    git-deployer status prod --format json"
    )]
    Status(StatusArgs),
    #[command(
        about = "Move an environment tag to the tip of its branch",
        long_about = "Deploy checks out and fast-forwards the branch, replaces the environment's annotated tag and pushes it. With --all-outdated only environments with pending commits are deployed.",
        after_help = "Examples:\n    git-deployer deploy preprod\n    git-deployer deploy --all-outdated"
    )]
    Deploy(DeployArgs),
    #[command(
        about = "List commits between an environment tag and its branch",
        long_about = "Commits shows what a deploy would ship (tag..branch), or with --ahead what the tag has that the branch lost (branch..tag). Newest first.",
        after_help = "Example:\n    git-deployer commits test --ahead"
    )]
    Commits(CommitsArgs),
    #[command(
        about = "Manage environment to branch mappings",
        after_help = "Examples:\n    git-deployer env list\n    git-deployer env set qa release/qa\n    git-deployer env remove qa"
    )]
    Env(EnvArgs),
    #[command(about = "Print the checkout directory for the configured repository")]
    Path,
}

pub async fn run(args: Args) -> crate::Result<ExitCode> {
    let global = args.global;
    match args.command {
        Command::Init(init_args) => commands::init(&global, init_args).await,
        Command::Status(status_args) => commands::status(&global, status_args).await,
        Command::Deploy(deploy_args) => commands::deploy(&global, deploy_args).await,
        Command::Commits(commits_args) => commands::commits(&global, commits_args).await,
        Command::Env(env_args) => commands::env(&global, env_args),
        Command::Path => commands::path(&global),
    }
}
