//! Subprocess execution for the external tools.
//!
//! Every tool invocation goes through a [`ProcessRunner`]. The production
//! implementation spawns the program directly from an argv vector (no shell),
//! drains stdout/stderr concurrently and enforces a hard wall-clock timeout,
//! killing the child when it expires. A non-zero exit is data, not an error:
//! callers decide what it means for their tool.

use std::{fmt, process::Stdio, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Command,
    sync::Semaphore,
    task::JoinHandle,
    time::timeout,
};
use tracing::{debug, warn};

use crate::error::{ReconError, Result};

/// How long to wait for the pipe readers once the child has exited or been
/// killed. Grandchildren that inherited the pipes could otherwise hold them
/// open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// A program plus its arguments, passed verbatim to `execve`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Outcome of a single tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    /// Exit status; `None` when the process was terminated by a signal,
    /// including the kill issued on timeout.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl RunResult {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Human readable reason suitable for a failed job record.
    pub fn failure_reason(&self, tool: &str, limit: Duration) -> String {
        if self.timed_out {
            return format!(
                "{} timed out after {}s",
                tool,
                limit.as_secs_f64()
            );
        }

        let detail = self.stderr.trim();
        let detail = if detail.is_empty() {
            self.stdout.trim()
        } else {
            detail
        };

        match self.exit_code {
            Some(code) if detail.is_empty() => {
                format!("{} exited with status {}", tool, code)
            }
            Some(code) => {
                format!("{} exited with status {}: {}", tool, code, detail)
            }
            None => format!("{} was terminated by a signal", tool),
        }
    }
}

/// Executes one external command with a timeout.
#[async_trait]
pub trait ProcessRunner: Send + Sync + fmt::Debug {
    async fn run(
        &self,
        spec: &CommandSpec,
        limit: Duration,
    ) -> Result<RunResult>;
}

/// Runs commands as real OS processes via `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        limit: Duration,
    ) -> Result<RunResult> {
        debug!(
            command = %spec,
            timeout_ms = limit.as_millis() as u64,
            "spawning tool"
        );

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                ReconError::ToolExecutionFailed(format!(
                    "failed to spawn {}: {}",
                    spec.program, err
                ))
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let (exit_code, timed_out) = match timeout(limit, child.wait()).await {
            Ok(status) => (status?.code(), false),
            Err(_) => {
                warn!(
                    command = %spec,
                    timeout_ms = limit.as_millis() as u64,
                    "tool exceeded its timeout; killing"
                );
                if let Err(err) = child.kill().await {
                    warn!(command = %spec, error = %err, "failed to kill tool");
                }
                (None, true)
            }
        };

        let result = RunResult {
            exit_code,
            stdout: collect(stdout).await,
            stderr: collect(stderr).await,
            timed_out,
        };

        debug!(
            command = %spec,
            exit_code = ?result.exit_code,
            timed_out = result.timed_out,
            stdout_bytes = result.stdout.len(),
            "tool finished"
        );

        Ok(result)
    }
}

fn drain<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe
            && let Err(err) = pipe.read_to_end(&mut buf).await
        {
            debug!(error = %err, "tool pipe closed with error");
        }
        buf
    })
}

async fn collect(mut handle: JoinHandle<Vec<u8>>) -> String {
    match timeout(DRAIN_GRACE, &mut handle).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(err)) => {
            warn!(error = %err, "tool output reader failed");
            String::new()
        }
        Err(_) => {
            handle.abort();
            warn!("tool output still open after exit; discarding");
            String::new()
        }
    }
}

/// Caps how many subprocesses run at once across every caller sharing the
/// semaphore.
#[derive(Debug, Clone)]
pub struct BoundedRunner {
    inner: Arc<dyn ProcessRunner>,
    permits: Arc<Semaphore>,
}

impl BoundedRunner {
    pub fn new(inner: Arc<dyn ProcessRunner>, permits: Arc<Semaphore>) -> Self {
        Self { inner, permits }
    }
}

#[async_trait]
impl ProcessRunner for BoundedRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        limit: Duration,
    ) -> Result<RunResult> {
        // Waiting for a slot counts against the caller's limit.
        let _permit = match timeout(limit, self.permits.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(ReconError::Internal(
                    "process permits closed".to_string(),
                ));
            }
            Err(_) => {
                warn!(
                    program = %spec.program,
                    timeout_ms = limit.as_millis() as u64,
                    "no process slot became free"
                );
                return Err(ReconError::ToolExecutionFailed(format!(
                    "no process slot free within {}s for {}",
                    limit.as_secs_f64(),
                    spec.program
                )));
            }
        };
        self.inner.run(spec, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_spec_display_joins_args() {
        let spec = CommandSpec::new("nmap").args(["-sS", "-p", "22"]);
        assert_eq!(spec.to_string(), "nmap -sS -p 22");
    }

    #[test]
    fn failure_reason_prefers_stderr() {
        let result = RunResult {
            exit_code: Some(1),
            stdout: "partial".into(),
            stderr: "permission denied\n".into(),
            timed_out: false,
        };
        assert_eq!(
            result.failure_reason("nmap", Duration::from_secs(1)),
            "nmap exited with status 1: permission denied"
        );
    }

    #[test]
    fn failure_reason_reports_timeout() {
        let result = RunResult {
            timed_out: true,
            ..RunResult::default()
        };
        assert!(
            result
                .failure_reason("john", Duration::from_secs(30))
                .contains("timed out after 30s")
        );
        assert!(!result.success());
    }
}
