//! Subprocess-backed extraction capabilities
//!
//! A framework that lives in another runtime is driven as a child process that
//! receives the document path as its last argument and writes the extracted
//! text to stdout. [`SubprocessExtractor`] blocks on the child and is meant for
//! the synchronous worker pool; [`AsyncSubprocessExtractor`] awaits it through
//! tokio. Both kill the child if the attempt is abandoned.

use crate::extractor::{AsyncExtractor, ExtractionError, SyncExtractor};
use async_trait::async_trait;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Output, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How often a blocking extraction checks its child and its cancel token
const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Program, base arguments and environment of an extraction subprocess
#[derive(Debug, Clone, PartialEq)]
pub struct SubprocessCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl SubprocessCommand {
    /// # Arguments
    /// * `program` - Path to executable (e.g., "python3", "uv")
    /// * `args` - Base arguments placed before the document path
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            env: Vec::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    fn std_command(&self, file_path: &Path) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd.arg(file_path);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }

    fn tokio_command(&self, file_path: &Path) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::from(self.std_command(file_path));
        cmd.kill_on_drop(true);
        cmd
    }
}

/// Turn a finished child process into extracted text or a classified error
fn parse_output(output: Output) -> Result<String, ExtractionError> {
    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(classify_failure(output.status.code(), &stderr))
}

/// Classify a failed child by the exception line it printed last
///
/// Interpreters report an uncaught error as `Kind: message` on the final
/// stderr line. Import failures become [`ExtractionError::MissingDependency`];
/// anything unrecognized stays a plain subprocess failure.
pub fn classify_failure(code: Option<i32>, stderr: &str) -> ExtractionError {
    let last_line = stderr.lines().rev().map(str::trim).find(|l| !l.is_empty());

    if let Some((kind, message)) = last_line.and_then(|line| line.split_once(": ")) {
        let kind = kind.rsplit('.').next().unwrap_or(kind);
        let is_identifier = !kind.is_empty() && kind.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if is_identifier && (kind.ends_with("Error") || kind.ends_with("Exception")) {
            return match kind {
                "ModuleNotFoundError" | "ImportError" => ExtractionError::MissingDependency(message.to_string()),
                "FileNotFoundError" | "PermissionError" | "OSError" | "IOError" => ExtractionError::Io(
                    std::io::Error::other(message.to_string()),
                ),
                _ => ExtractionError::other(kind, message),
            };
        }
    }

    ExtractionError::Subprocess {
        code,
        stderr: stderr.trim().to_string(),
    }
}

fn spawn_failure(command: &SubprocessCommand, error: std::io::Error) -> ExtractionError {
    if error.kind() == std::io::ErrorKind::NotFound {
        ExtractionError::MissingDependency(format!("Command '{}' not found", command.program.display()))
    } else {
        ExtractionError::Io(error)
    }
}

/// Blocking subprocess extraction
#[derive(Debug, Clone)]
pub struct SubprocessExtractor {
    command: SubprocessCommand,
}

impl SubprocessExtractor {
    pub fn new(command: SubprocessCommand) -> Self {
        Self { command }
    }
}

impl SyncExtractor for SubprocessExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, ExtractionError> {
        self.extract_text_cancellable(path, &CancellationToken::new())
    }

    /// Kills the child (not its descendants) once `cancel` fires
    fn extract_text_cancellable(&self, path: &Path, cancel: &CancellationToken) -> Result<String, ExtractionError> {
        let mut child = self
            .command
            .std_command(path)
            .spawn()
            .map_err(|e| spawn_failure(&self.command, e))?;

        // Drain both pipes while waiting so a chatty child never blocks on a full buffer
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if cancel.is_cancelled() => {
                    reap(&mut child);
                    tracing::debug!("Killed {} after cancellation", self.command.program.display());
                    return Err(ExtractionError::other(
                        "Cancelled",
                        format!("{} was killed", self.command.program.display()),
                    ));
                }
                Ok(None) => std::thread::sleep(CHILD_POLL_INTERVAL),
                Err(e) => {
                    reap(&mut child);
                    return Err(e.into());
                }
            }
        };

        parse_output(Output {
            status,
            stdout: collect(stdout),
            stderr: collect(stderr),
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe
            && let Err(e) = pipe.read_to_end(&mut buf)
        {
            tracing::debug!("Failed to read subprocess pipe: {}", e);
        }
        buf
    })
}

fn collect(handle: JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Non-blocking subprocess extraction
#[derive(Debug, Clone)]
pub struct AsyncSubprocessExtractor {
    command: SubprocessCommand,
}

impl AsyncSubprocessExtractor {
    pub fn new(command: SubprocessCommand) -> Self {
        Self { command }
    }
}

#[async_trait]
impl AsyncExtractor for AsyncSubprocessExtractor {
    async fn extract_text(&self, path: &Path) -> Result<String, ExtractionError> {
        let child = self
            .command
            .tokio_command(path)
            .spawn()
            .map_err(|e| spawn_failure(&self.command, e))?;
        let output = child.wait_with_output().await?;
        parse_output(output)
    }
}
