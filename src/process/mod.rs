// ABOUTME: Runs external registry tools (docker, skopeo, vendor CLIs) with a deadline.
// ABOUTME: A timed-out child is killed and reported with the "timeout" stderr sentinel.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::classify::TIMEOUT_SENTINEL;

/// Output of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn timed_out() -> Self {
        Self {
            success: false,
            exit_code: None,
            stdout: String::new(),
            stderr: TIMEOUT_SENTINEL.to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        !self.success && self.stderr == TIMEOUT_SENTINEL
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("{0} is not installed or not in PATH")]
    NotInstalled(String),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Executes a program with arguments under a timeout.
///
/// Secrets go through `input`, which is written to the child's stdin and
/// never logged.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run_with_input(
        &self,
        program: &str,
        args: &[&str],
        input: Option<&str>,
        timeout: Duration,
    ) -> Result<CommandOutput, ProcessError>;

    async fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, ProcessError> {
        self.run_with_input(program, args, None, timeout).await
    }
}

/// Runs commands as local child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run_with_input(
        &self,
        program: &str,
        args: &[&str],
        input: Option<&str>,
        timeout: Duration,
    ) -> Result<CommandOutput, ProcessError> {
        if input.is_some() {
            tracing::debug!("Running {} {} (with stdin)", program, args.join(" "));
        } else {
            tracing::debug!("Running {} {}", program, args.join(" "));
        }

        let stdin = if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        };
        let mut child = Command::new(program)
            .args(args)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(program, e))?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let collect = async {
            let (_, out, err) = tokio::join!(
                write_pipe(stdin, input),
                read_pipe(stdout),
                read_pipe(stderr)
            );
            let status = child.wait().await;
            (status, out, err)
        };

        match tokio::time::timeout(timeout, collect).await {
            Ok((Ok(status), stdout, stderr)) => Ok(CommandOutput {
                success: status.success(),
                exit_code: status.code(),
                stdout,
                stderr,
            }),
            Ok((Err(e), _, _)) => Err(spawn_error(program, e)),
            Err(_) => {
                tracing::warn!("{} timed out after {:?}, killing it", program, timeout);
                if let Err(e) = child.start_kill() {
                    tracing::debug!("Failed to kill {}: {}", program, e);
                }
                let _ = child.wait().await;
                Ok(CommandOutput::timed_out())
            }
        }
    }
}

async fn write_pipe<W>(pipe: Option<W>, input: Option<&str>)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    use tokio::io::AsyncWriteExt;

    if let (Some(mut pipe), Some(input)) = (pipe, input) {
        if let Err(e) = pipe.write_all(input.as_bytes()).await {
            tracing::debug!("Failed to write child input: {}", e);
        }
        // Dropping the pipe closes the child's stdin.
        let _ = pipe.shutdown().await;
    }
}

async fn read_pipe<R>(pipe: Option<R>) -> String
where
    R: tokio::io::AsyncRead + Unpin,
{
    use tokio::io::AsyncReadExt;

    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe
        && let Err(e) = pipe.read_to_end(&mut buf).await
    {
        tracing::debug!("Failed to read child output: {}", e);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn spawn_error(program: &str, e: std::io::Error) -> ProcessError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ProcessError::NotInstalled(program.to_string())
    } else {
        ProcessError::Spawn {
            program: program.to_string(),
            source: e,
        }
    }
}

/// Check whether a tool answers `<program> --version` within the deadline.
pub async fn tool_available(runner: &dyn CommandRunner, program: &str, timeout: Duration) -> bool {
    match runner.run(program, &["--version"], timeout).await {
        Ok(output) => output.success,
        Err(e) => {
            tracing::debug!("{} unavailable: {}", program, e);
            false
        }
    }
}
