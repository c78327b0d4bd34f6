use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::warn;

use super::model::AlignedRecord;
use super::prompt::PromptBuilder;
use super::provider::{LlmError, LlmJob, LlmProvider, Result};
use super::schema::{strip_code_fences, validate_aligned_json};

/// Drives a local CLI model (e.g. a self-hosted inference binary) over
/// stdin/stdout. Enforces the same deadline discipline as every other
/// external call: SIGTERM on timeout, with a grace window before
/// the child is killed outright.
pub struct SubprocessProvider {
    command: String,
    args: Vec<String>,
    timeout: Duration,
    kill_grace: Duration,
}

impl SubprocessProvider {
    pub fn new(command: String, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command,
            args,
            timeout,
            kill_grace: Duration::from_secs(5),
        }
    }

    /// Sends SIGTERM and gives the child `kill_grace` to exit on its own
    /// before escalating to SIGKILL.
    async fn terminate(&self, child: &mut Child) {
        if let Some(pid) = child.id() {
            let pid = Pid::from_raw(pid as i32);
            if let Err(err) = signal::kill(pid, Signal::SIGTERM) {
                warn!(command = %self.command, %err, "SIGTERM failed, killing directly");
                let _ = child.kill().await;
                let _ = child.wait().await;
                return;
            }
        }

        if tokio::time::timeout(self.kill_grace, child.wait()).await.is_err() {
            warn!(command = %self.command, "child ignored SIGTERM, sending SIGKILL");
            let _ = child.kill().await;
            let _ = child.wait().await;
        }
    }
}

#[async_trait]
impl LlmProvider for SubprocessProvider {
    fn name(&self) -> &'static str {
        "subprocess"
    }

    async fn align(&self, job: &LlmJob) -> Result<AlignedRecord> {
        let raw_text = String::from_utf8_lossy(&job.raw_bytes);
        let prompt = format!(
            "{}\n\n{}",
            PromptBuilder::system_instruction(),
            PromptBuilder::user_message(&raw_text)
        );

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| LlmError::Request(format!("failed to spawn subprocess: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| LlmError::Request(e.to_string()))?;
        }

        let mut stdout_pipe = child.stdout.take().expect("stdout piped at spawn");
        let stdout_handle = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stdout_pipe.read_to_end(&mut buf).await;
            buf
        });

        let status = tokio::select! {
            result = child.wait() => {
                result.map_err(|e| LlmError::Request(e.to_string()))?
            }
            _ = tokio::time::sleep(self.timeout) => {
                warn!(command = %self.command, "subprocess exceeded deadline, sending SIGTERM");
                self.terminate(&mut child).await;
                return Err(LlmError::Timeout);
            }
        };

        let stdout_bytes = stdout_handle.await.unwrap_or_default();

        if !status.success() {
            return Err(LlmError::SubprocessFailed(status.to_string()));
        }

        let stdout = String::from_utf8_lossy(&stdout_bytes);
        let parsed: Value = serde_json::from_str(strip_code_fences(&stdout))
            .map_err(|e| LlmError::SchemaViolation(format!("invalid json: {e}")))?;
        validate_aligned_json(&parsed)?;

        serde_json::from_value(parsed).map_err(|e| LlmError::SchemaViolation(e.to_string()))
    }
}
