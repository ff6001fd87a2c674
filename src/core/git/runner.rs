use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const REDACTED: &str = "<redacted>";

/// One external command: program, argv tokens and the directory to run it in.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    /// Text that is passed to the process but never logged or reported.
    pub secrets: Vec<String>,
}

impl CommandRequest {
    pub fn new<I, S>(program: &str, args: I, cwd: &Path) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: cwd.to_path_buf(),
            env: Vec::new(),
            secrets: Vec::new(),
        }
    }

    /// A `git` invocation that fails instead of prompting for credentials and
    /// writes its messages untranslated.
    pub fn git<I, S>(args: I, cwd: &Path) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut request = Self::new("git", args, cwd);
        request
            .env
            .push(("GIT_TERMINAL_PROMPT".to_string(), "0".to_string()));
        request.env.push(("LC_ALL".to_string(), "C".to_string()));
        request
    }

    /// Mask `secret` wherever this request's command line or output is shown.
    pub fn redacting(mut self, secret: &str) -> Self {
        if !secret.is_empty() {
            self.secrets.push(secret.to_string());
        }
        self
    }

    /// Command line as it would be typed, for logs and error messages.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        self.redact(&line)
    }

    /// `text` with every registered secret masked.
    pub fn redact(&self, text: &str) -> String {
        self.secrets
            .iter()
            .fold(text.to_string(), |text, secret| text.replace(secret.as_str(), REDACTED))
    }

    /// `result` with every registered secret masked in its output.
    pub fn redact_result(&self, mut result: CommandResult) -> CommandResult {
        if !self.secrets.is_empty() {
            result.stdout = self.redact(&result.stdout);
            result.stderr = self.redact(&result.stderr);
        }
        result
    }
}

impl fmt::Debug for CommandRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRequest")
            .field("command", &self.display())
            .field("cwd", &self.cwd)
            .field("env", &self.env)
            .finish()
    }
}

/// Captured outcome of one external command. A non-zero exit is a normal
/// result, never an error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub succeeded: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    /// A failed result for a command that never produced an exit status.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            exit_code: None,
            stdout: String::new(),
            stderr: message.into(),
        }
    }

    /// Best description of why the command failed.
    pub fn error_message(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.exit_code {
            Some(code) => format!("exited with status {}", code),
            None => "terminated without an exit status".to_string(),
        }
    }

    /// Stdout followed by stderr; git reports push progress on stderr.
    pub fn combined_output(&self) -> String {
        let stdout = self.stdout.trim_end();
        let stderr = self.stderr.trim_end();
        match (stdout.is_empty(), stderr.is_empty()) {
            (false, false) => format!("{}\n{}", stdout, stderr),
            (false, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (true, true) => String::new(),
        }
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync + 'static {
    async fn run(&self, request: &CommandRequest) -> CommandResult;
}

/// Runs commands as child processes with an optional wall-clock limit.
#[derive(Clone, Debug, Default)]
pub struct TokioCommandRunner {
    timeout: Option<Duration>,
}

impl TokioCommandRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, request: &CommandRequest) -> CommandResult {
        let mut command = Command::new(&request.program);
        command
            .args(&request.args)
            .current_dir(&request.cwd)
            .envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                return CommandResult::failure(format!(
                    "failed to start `{}` in {}: {}",
                    request.program,
                    request.cwd.display(),
                    err
                ))
            }
        };

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output,
                Err(_) => {
                    return CommandResult::failure(format!(
                        "`{}` timed out after {}",
                        request.display(),
                        humantime::format_duration(limit)
                    ))
                }
            },
            None => child.wait_with_output().await,
        };

        match output {
            Ok(output) => CommandResult {
                succeeded: output.status.success(),
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            },
            Err(err) => CommandResult::failure(format!(
                "failed to collect output of `{}`: {}",
                request.display(),
                err
            )),
        }
    }
}
