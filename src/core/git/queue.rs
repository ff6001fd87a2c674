use super::runner::{CommandRequest, CommandResult, CommandRunner, TokioCommandRunner};
use crate::core::events::EventSink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, Instant};

/// Pause between the end of one command and the start of the next.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);
const LOGGED_OUTPUT_LINES: usize = 20;

struct CommandJob {
    request: CommandRequest,
    completion: oneshot::Sender<CommandResult>,
}

/// Process-wide FIFO of external commands.
///
/// A single worker task owns the runner and drains jobs strictly in submission
/// order, so at most one command is ever executing. Every submitted job
/// resolves exactly once; a failing job never affects the ones queued behind it.
#[derive(Clone)]
pub struct SerialQueue {
    jobs: mpsc::UnboundedSender<CommandJob>,
    busy: Arc<AtomicBool>,
}

impl SerialQueue {
    /// Spawn a queue backed by real child processes. Must be called inside a
    /// tokio runtime.
    pub fn new(
        settle_delay: Duration,
        command_timeout: Option<Duration>,
        events: Option<EventSink>,
    ) -> Self {
        Self::with_runner(
            Arc::new(TokioCommandRunner::new(command_timeout)),
            settle_delay,
            events,
        )
    }

    pub fn with_runner(
        runner: Arc<dyn CommandRunner>,
        settle_delay: Duration,
        events: Option<EventSink>,
    ) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        let busy = Arc::new(AtomicBool::new(false));

        let worker_busy = busy.clone();
        tokio::spawn(async move {
            drain(runner, rx, worker_busy, settle_delay, events).await;
        });

        Self { jobs, busy }
    }

    /// Queue `request` and wait for its result.
    pub async fn submit(&self, request: CommandRequest) -> CommandResult {
        let (completion, result) = oneshot::channel();
        let command = request.display();
        if self.jobs.send(CommandJob { request, completion }).is_err() {
            tracing::error!(command = %command, "command queue is closed");
            return CommandResult::failure(format!("command queue is closed; `{}` not run", command));
        }

        result.await.unwrap_or_else(|_| {
            CommandResult::failure(format!("command queue stopped before `{}` finished", command))
        })
    }

    /// Whether a command is executing right now.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

async fn drain(
    runner: Arc<dyn CommandRunner>,
    mut jobs: mpsc::UnboundedReceiver<CommandJob>,
    busy: Arc<AtomicBool>,
    settle_delay: Duration,
    events: Option<EventSink>,
) {
    let mut last_finished: Option<Instant> = None;

    while let Some(job) = jobs.recv().await {
        if let Some(finished) = last_finished {
            let elapsed = finished.elapsed();
            if elapsed < settle_delay {
                sleep(settle_delay - elapsed).await;
            }
        }

        busy.store(true, Ordering::SeqCst);
        let command = job.request.display();
        let cwd = job.request.cwd.display().to_string();
        tracing::info!(command = %command, cwd = %cwd, "Executing command");
        report(&events, format!("Executing command: {}>{}", cwd, command), false);

        let result = job.request.redact_result(runner.run(&job.request).await);

        if result.succeeded {
            tracing::info!(command = %command, "Command succeeded");
            report(&events, format!("Command succeeded: {}", command), false);
            if let Some(summary) = abbreviate_output(&result.stdout) {
                tracing::debug!(command = %command, "Command output: {}", summary);
                report(&events, format!("Command output: {}", summary), false);
            }
        } else {
            let message = result.error_message();
            tracing::error!(command = %command, exit_code = ?result.exit_code, "Command failed: {}", message);
            report(&events, format!("Command failed: {}", message), true);
        }

        busy.store(false, Ordering::SeqCst);
        last_finished = Some(Instant::now());

        if job.completion.send(result).is_err() {
            tracing::debug!(command = %command, "caller stopped waiting for command result");
        }
    }
}

fn report(events: &Option<EventSink>, message: String, is_error: bool) {
    if let Some(sink) = events {
        sink.log(message, is_error);
    }
}

/// Single-line output verbatim; multi-line output indented and capped.
fn abbreviate_output(output: &str) -> Option<String> {
    let lines: Vec<&str> = output.lines().filter(|line| !line.trim().is_empty()).collect();
    match lines.len() {
        0 => None,
        1 => Some(lines[0].trim().to_string()),
        total => {
            let mut summary = String::new();
            for line in lines.iter().take(LOGGED_OUTPUT_LINES) {
                summary.push_str("\n   ");
                summary.push_str(line);
            }
            if total > LOGGED_OUTPUT_LINES {
                summary.push_str(&format!(
                    "\n   ... ({} more lines)",
                    total - LOGGED_OUTPUT_LINES
                ));
            }
            Some(summary)
        }
    }
}
