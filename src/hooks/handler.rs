use super::registration::HookEvent;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Payload handed to a handler: the lifecycle instant plus the current task
/// attributes as a flat key/value map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookContext {
    pub event: HookEvent,
    pub attributes: HashMap<String, String>,
}

/// One registered hook handler. The dispatcher owns the timeout; a handler
/// only reports success or failure.
#[async_trait]
pub trait HookHandler: Send + Sync {
    async fn run(&self, context: &HookContext) -> Result<()>;
}

/// Runs `handler_ref` as an external command with the context as JSON on
/// stdin. A non-zero exit is a handler failure; stderr becomes the reason.
pub struct CommandHandler {
    command: String,
}

impl CommandHandler {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl HookHandler for CommandHandler {
    async fn run(&self, context: &HookContext) -> Result<()> {
        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| anyhow!("empty handler command"))?;

        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The dispatcher enforces the timeout by dropping this future;
            // the child must not outlive it.
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn hook handler {}", self.command))?;

        let payload = serde_json::to_vec(context)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await?;
        }

        let output = child.wait_with_output().await?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(anyhow!(
                "exit status {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            ))
        }
    }
}
