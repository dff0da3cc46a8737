use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::warn;

use crate::errors::HiveError;

/// Captured output of one collaborator invocation. A non-zero exit is not an
/// error at this layer: whatever partial stdout was produced is still used.
#[derive(Debug, Default, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// Seam for invoking external scan collaborators. Production uses
/// subprocesses; tests substitute canned output.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&str>,
    ) -> Result<ToolOutput, HiveError>;
}

/// Runs collaborators as subprocesses with piped stdio and a hard timeout.
pub struct SubprocessRunner {
    timeout: Duration,
}

impl SubprocessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ToolRunner for SubprocessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&str>,
    ) -> Result<ToolOutput, HiveError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HiveError::Tool(format!("Failed to spawn {}: {}", program, e)))?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            let input = input.to_string();
            // Writing can block until the child drains; do it concurrently
            // with output collection.
            tokio::spawn(async move {
                let _ = pipe.write_all(input.as_bytes()).await;
                let _ = pipe.write_all(b"\n").await;
                // pipe drops here, closing the child's stdin
            });
        }

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let stdout_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut pipe) = stdout_pipe {
                let _ = pipe.read_to_string(&mut buf).await;
            }
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut pipe) = stderr_pipe {
                let _ = pipe.read_to_string(&mut buf).await;
            }
            buf
        });

        let exit_code = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status
                .map_err(|e| HiveError::Tool(format!("Failed to wait on {}: {}", program, e)))?
                .code(),
            Err(_) => {
                warn!(program, timeout_secs = self.timeout.as_secs(), "Collaborator timed out, killing");
                let _ = child.kill().await;
                None
            }
        };

        Ok(ToolOutput {
            stdout: stdout_task.await.unwrap_or_default(),
            stderr: stderr_task.await.unwrap_or_default(),
            exit_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subprocess_captures_stdout() {
        let runner = SubprocessRunner::new(Duration::from_secs(10));
        let out = runner
            .run("echo", &["hello".to_string()], None)
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_subprocess_feeds_stdin() {
        let runner = SubprocessRunner::new(Duration::from_secs(10));
        let out = runner.run("cat", &[], Some("a\nb")).await.unwrap();
        assert_eq!(out.stdout.trim(), "a\nb");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_not_an_error() {
        let runner = SubprocessRunner::new(Duration::from_secs(10));
        let out = runner
            .run("sh", &["-c".to_string(), "echo partial; exit 3".to_string()], None)
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "partial");
        assert_eq!(out.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let runner = SubprocessRunner::new(Duration::from_secs(10));
        let result = runner.run("definitely-not-a-real-tool-xyz", &[], None).await;
        assert!(result.is_err());
    }
}
