//! Text generation seam
//!
//! Agents "think" through an injected [`Generator`]. Production runs a
//! configured command with the prompt on stdin; tests substitute fakes.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{BoardError, BoardResult};
use crate::notify::truncate;

/// Turns a prompt into free-form text.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> BoardResult<String>;
}

/// Runs an external command per prompt. The process is killed when the
/// timeout fires or the future is dropped.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }
}

#[async_trait]
impl Generator for CommandGenerator {
    async fn generate(&self, prompt: &str) -> BoardResult<String> {
        debug!(program = %self.program, prompt_chars = prompt.len(), "Invoking generator");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    BoardError::ExternalFailure(format!("generator command not found: {}", self.program))
                } else {
                    BoardError::ExternalFailure(format!("failed to start generator: {e}"))
                }
            })?;

        let stdin = child.stdin.take();
        let payload = prompt.as_bytes().to_vec();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&payload).await?;
                stdin.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        };

        let run = async move {
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            match fed {
                // The command may exit without reading its input
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e),
                _ => {}
            }
            output
        };

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                BoardError::ExternalFailure(format!(
                    "generator timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| BoardError::ExternalFailure(format!("generator I/O error: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BoardError::ExternalFailure(format!(
                "generator exited with status {}: {}",
                output.status.code().unwrap_or(-1),
                truncate(&stderr, 300)
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(BoardError::ExternalFailure(
                "generator returned an empty response".to_string(),
            ));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> CommandGenerator {
        CommandGenerator::new("sh", vec!["-c".to_string(), script.to_string()], timeout)
    }

    #[tokio::test]
    async fn test_prompt_is_written_to_stdin() {
        let generator = sh("cat", Duration::from_secs(5));
        let text = generator.generate("hello agent\n").await.unwrap();
        assert_eq!(text, "hello agent");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_external_failure() {
        let generator = sh("echo boom >&2; exit 3", Duration::from_secs(5));
        let err = generator.generate("x").await.unwrap_err();
        assert!(matches!(err, BoardError::ExternalFailure(ref m) if m.contains("boom")));
    }

    #[tokio::test]
    async fn test_empty_output_is_external_failure() {
        let generator = sh("true", Duration::from_secs(5));
        let err = generator.generate("x").await.unwrap_err();
        assert!(matches!(err, BoardError::ExternalFailure(ref m) if m.contains("empty")));
    }

    #[tokio::test]
    async fn test_timeout_kills_the_command() {
        let generator = sh("sleep 5", Duration::from_millis(100));
        let err = generator.generate("x").await.unwrap_err();
        assert!(matches!(err, BoardError::ExternalFailure(ref m) if m.contains("timed out")));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let generator = CommandGenerator::new("definitely-not-a-real-binary-xyz", vec![], Duration::from_secs(1));
        let err = generator.generate("x").await.unwrap_err();
        assert!(matches!(err, BoardError::ExternalFailure(ref m) if m.contains("not found")));
    }

    #[tokio::test]
    async fn test_mock_generator() {
        let mut mock = MockGenerator::new();
        mock.expect_generate()
            .withf(|prompt| prompt.contains("STATUS"))
            .times(1)
            .returning(|_| Ok("STATUS: review".to_string()));
        let text = mock.generate("reply with STATUS").await.unwrap();
        assert_eq!(text, "STATUS: review");
    }
}
