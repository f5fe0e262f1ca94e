use super::{ChangeProcess, ChangeRequest, ChangeResponse};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// External change process driven as a command: the request goes to stdin as
/// JSON, the response comes back on stdout as JSON. Same contract the hook
/// command handlers use.
pub struct CommandChangeProcess {
    command: String,
}

impl CommandChangeProcess {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl ChangeProcess for CommandChangeProcess {
    async fn apply(&self, request: ChangeRequest) -> Result<ChangeResponse> {
        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| anyhow!("empty change process command"))?;

        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn change process {}", self.command))?;

        let payload = serde_json::to_vec(&request)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "change process exited with {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            ));
        }

        serde_json::from_slice(&output.stdout).context("change process returned malformed JSON")
    }
}
