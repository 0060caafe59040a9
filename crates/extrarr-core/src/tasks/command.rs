//! Task body that runs an external command (catalog sync collaborators).

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::scheduler::TaskBody;

/// Runs `sh -c <command>`; a missing command makes the task a logged no-op.
#[derive(Debug, Clone)]
pub struct CommandTask {
    label: String,
    command: Option<String>,
}

impl CommandTask {
    pub fn new(label: impl Into<String>, command: Option<String>) -> Self {
        Self {
            label: label.into(),
            command,
        }
    }
}

#[async_trait]
impl TaskBody for CommandTask {
    async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let Some(command) = self.command.as_deref() else {
            tracing::debug!(task = %self.label, "no command configured, nothing to do");
            return Ok(());
        };

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .kill_on_drop(true)
            .output();
        let output = tokio::select! {
            out = child => out.with_context(|| format!("spawn {}", command))?,
            _ = cancel.cancelled() => bail!("{} cancelled", self.label),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last = stderr
                .lines()
                .rev()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .unwrap_or("no output");
            bail!("{} exited with {}: {}", self.label, output.status, last);
        }
        Ok(())
    }
}
