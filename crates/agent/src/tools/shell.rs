//! Shell command capability.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

use super::path_guard::PathGuard;
use super::ToolTrait;

const MAX_OUTPUT_LEN: usize = 10000;

/// Shell execution with a timeout and bounded output
pub struct ExecTool {
    guard: Arc<PathGuard>,
    default_dir: PathBuf,
    timeout_secs: u64,
}

impl ExecTool {
    pub fn new(guard: Arc<PathGuard>, default_dir: PathBuf) -> Self {
        Self {
            guard,
            default_dir,
            timeout_secs: 60,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

#[derive(Deserialize)]
struct ExecArgs {
    command: String,
    working_dir: Option<String>,
}

#[async_trait]
impl ToolTrait for ExecTool {
    fn name(&self) -> &str {
        "exec"
    }
    fn description(&self) -> &str {
        "Execute a shell command. Use with caution."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "Shell command" },
                "working_dir": { "type": "string", "description": "Optional working directory" }
            },
            "required": ["command"]
        })
    }
    async fn execute(
        &self,
        args: serde_json::Value,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let args: ExecArgs = serde_json::from_value(args)?;

        // A caller-supplied working directory must pass the guard
        let working_dir = match &args.working_dir {
            Some(dir) => self.guard.resolve(dir)?,
            None => self.default_dir.clone(),
        };

        debug!("exec: {}", args.command);
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&args.command)
            .current_dir(working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let result = match tokio::time::timeout(
            tokio::time::Duration::from_secs(self.timeout_secs),
            cmd.output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Ok(format!("Execution failed: {}", e)),
            Err(_) => return Ok(format!("Timed out after {} seconds", self.timeout_secs)),
        };

        let mut parts = Vec::new();
        if !result.stdout.is_empty() {
            parts.push(String::from_utf8_lossy(&result.stdout).to_string());
        }
        if !result.stderr.is_empty() {
            parts.push(format!(
                "STDERR:\n{}",
                String::from_utf8_lossy(&result.stderr)
            ));
        }
        if result.status.code() != Some(0) {
            parts.push(format!("EXIT CODE: {}", result.status.code().unwrap_or(-1)));
        }
        let result = if parts.is_empty() {
            "(no output)".to_string()
        } else {
            parts.join("\n")
        };
        if result.len() > MAX_OUTPUT_LEN {
            let cut = result
                .char_indices()
                .map(|(i, _)| i)
                .take_while(|&i| i <= MAX_OUTPUT_LEN)
                .last()
                .unwrap_or(0);
            Ok(format!(
                "{}\n[output truncated: {} bytes remaining]",
                &result[..cut],
                result.len() - cut
            ))
        } else {
            Ok(result)
        }
    }
}
