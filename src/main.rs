use clap::Parser;
use git_deployer::cli::{self, commands::settings_path, Args};
use git_deployer::logging;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config_dir = settings_path(&args.global)
        .ok()
        .and_then(|path| path.parent().map(|dir| dir.to_path_buf()));
    let _guard = match logging::init(config_dir.as_deref(), args.global.format, args.global.verbose) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("warning: logging disabled: {:#}", err);
            None
        }
    };

    match cli::run(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
