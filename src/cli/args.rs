use crate::core::types::OutputFormat;
use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Flags accepted by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Settings file (default: <config dir>/git-deployer/settings.toml, or $GIT_DEPLOYER_CONFIG)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format for command results
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Log at debug level (RUST_LOG still takes precedence)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Repository URL to track; saved to settings
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Access token embedded in https clone URLs; saved to settings
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Environment to check (default: every configured environment)
    #[arg(value_name = "ENV")]
    pub environment: Option<String>,
}

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Environment whose tag moves to the tip of its branch
    #[arg(value_name = "ENV", required_unless_present = "all_outdated")]
    pub environment: Option<String>,

    /// Deploy every environment with pending commits
    #[arg(long, conflicts_with = "environment")]
    pub all_outdated: bool,
}

#[derive(Args, Debug)]
pub struct CommitsArgs {
    /// Environment to compare against its branch
    #[arg(value_name = "ENV")]
    pub environment: String,

    /// List commits the tag has that the branch no longer has
    #[arg(long)]
    pub ahead: bool,
}

#[derive(Args, Debug)]
pub struct EnvArgs {
    #[command(subcommand)]
    pub command: EnvCommand,
}

#[derive(Subcommand, Debug)]
pub enum EnvCommand {
    /// Show configured environments and their branches
    List,
    /// Add an environment or point it at another branch
    Set {
        #[arg(value_name = "NAME")]
        name: String,
        #[arg(value_name = "BRANCH")]
        branch: String,
    },
    /// Forget an environment (its tag is left on the remote)
    Remove {
        #[arg(value_name = "NAME")]
        name: String,
    },
}
