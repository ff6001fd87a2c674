pub mod config;
pub mod layers;

pub use layers::console::ConsoleOutput;

use crate::core::types::OutputFormat;
use crate::logging::config::LoggingConfig;
use crate::logging::layers::{console, file};
use crate::Result;
use anyhow::{anyhow, Context};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::Registry;

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Guards that keep logging sinks active for the duration of the command.
pub struct LoggingGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
    console_output: ConsoleOutput,
    log_file_path: PathBuf,
}

impl LoggingGuard {
    /// Returns the console output configuration used during initialization.
    pub fn console_output(&self) -> ConsoleOutput {
        self.console_output
    }

    /// Returns the log file path backed by the file sink.
    pub fn log_file_path(&self) -> &Path {
        &self.log_file_path
    }
}

/// Initialize tracing with a console sink and a file sink.
///
/// `config_dir` is the directory holding the settings file; an optional
/// `logging.toml` next to it tunes the sinks. `RUST_LOG` wins over
/// everything, then `--verbose` (debug), then the configured level.
/// Errors when invoked more than once per process.
pub fn init(config_dir: Option<&Path>, format: OutputFormat, verbose: bool) -> Result<LoggingGuard> {
    if LOGGER_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(anyhow!("logging already initialized"));
    }

    let config = LoggingConfig::load(config_dir)?;
    let level = if verbose {
        "debug"
    } else {
        config.default_level.as_str()
    };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("failed to configure tracing level")?;
    let log_file_path = file::log_file_path(&config)?;

    type BaseRegistry = Registry;
    type FileSubscriber = file::FileLayerStack<BaseRegistry>;

    let (file_layer, file_guard) =
        file::file_layer::<BaseRegistry>(&log_file_path, config.enable_file)?;
    let subscriber = tracing_subscriber::registry().with(file_layer);

    let console_output = console::select_console_output(format, config.console_output);
    let console_layer = console::console_layer::<FileSubscriber>(console_output);
    let subscriber = subscriber.with(console_layer);

    subscriber.with(env_filter).init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
        console_output,
        log_file_path,
    })
}

#[cfg(test)]
/// Reset the initialization guard so tests can reconfigure logging multiple times.
pub fn reset_for_tests() {
    LOGGER_INITIALIZED.store(false, Ordering::SeqCst);
}
