//! Filesystem capabilities.
//!
//! Every target path goes through the shared [`PathGuard`] first; a denial
//! comes back as an error before any filesystem call is made. Recoverable
//! conditions (missing file, permission trouble) are reported as result
//! text so the model can react to them.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use tracing::debug;

use super::path_guard::PathGuard;
use super::ToolTrait;

/// File read capability
pub struct ReadFileTool {
    guard: Arc<PathGuard>,
}

impl ReadFileTool {
    pub fn new(guard: Arc<PathGuard>) -> Self {
        Self { guard }
    }
}

#[derive(Deserialize)]
struct ReadFileArgs {
    path: String,
}

#[async_trait]
impl ToolTrait for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }
    fn description(&self) -> &str {
        "Read a text file at the given path."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": { "path": { "type": "string", "description": "File path" } },
            "required": ["path"]
        })
    }
    async fn execute(
        &self,
        args: serde_json::Value,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let args: ReadFileArgs = serde_json::from_value(args)?;
        let path = self.guard.resolve(&args.path)?;

        debug!("reading {:?}", path);
        // Failures are errors here, not result text: a successful read_file
        // output is raw file content, and downstream file tracking relies on
        // that distinction
        if !path.exists() {
            return Err(format!("no file at: {}", args.path).into());
        }
        if !path.is_file() {
            return Err(format!("not a file: {}", args.path).into());
        }
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| format!("read failed: {}", e).into())
    }
}

/// File write capability
pub struct WriteFileTool {
    guard: Arc<PathGuard>,
}

impl WriteFileTool {
    pub fn new(guard: Arc<PathGuard>) -> Self {
        Self { guard }
    }
}

#[derive(Deserialize)]
struct WriteFileArgs {
    path: String,
    content: String,
}

#[async_trait]
impl ToolTrait for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }
    fn description(&self) -> &str {
        "Write content to a file, creating parent directories as needed."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Target path" },
                "content": { "type": "string", "description": "Content to write" }
            },
            "required": ["path", "content"]
        })
    }
    async fn execute(
        &self,
        args: serde_json::Value,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let args: WriteFileArgs = serde_json::from_value(args)?;
        let path = self.guard.resolve(&args.path)?;

        debug!("writing {:?}", path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        match tokio::fs::write(&path, &args.content).await {
            Ok(_) => Ok(format!(
                "Wrote {} bytes to {}",
                args.content.len(),
                args.path
            )),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Ok(format!("Permission denied: {}", args.path))
            }
            Err(e) => Ok(format!("Write failed: {}", e)),
        }
    }
}

/// Exact-match file edit capability
pub struct EditFileTool {
    guard: Arc<PathGuard>,
}

impl EditFileTool {
    pub fn new(guard: Arc<PathGuard>) -> Self {
        Self { guard }
    }
}

#[derive(Deserialize)]
struct EditFileArgs {
    path: String,
    old_text: String,
    new_text: String,
}

#[async_trait]
impl ToolTrait for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }
    fn description(&self) -> &str {
        "Replace old_text with new_text in a file. old_text must match exactly once."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Target path" },
                "old_text": { "type": "string", "description": "Text to replace" },
                "new_text": { "type": "string", "description": "Replacement text" }
            },
            "required": ["path", "old_text", "new_text"]
        })
    }
    async fn execute(
        &self,
        args: serde_json::Value,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let args: EditFileArgs = serde_json::from_value(args)?;
        let path = self.guard.resolve(&args.path)?;

        debug!("editing {:?}", path);
        if !path.exists() {
            return Ok(format!("No file at: {}", args.path));
        }
        let content = tokio::fs::read_to_string(&path).await?;
        if !content.contains(&args.old_text) {
            return Ok("old_text not found in file".to_string());
        }
        let count = content.matches(&args.old_text).count();
        if count > 1 {
            return Ok(format!("old_text is ambiguous: {} matches", count));
        }
        let new_content = content.replacen(&args.old_text, &args.new_text, 1);
        match tokio::fs::write(&path, new_content).await {
            Ok(_) => Ok(format!("Edited {}", args.path)),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Ok(format!("Permission denied: {}", args.path))
            }
            Err(e) => Ok(format!("Edit failed: {}", e)),
        }
    }
}

/// Directory listing capability
pub struct ListDirTool {
    guard: Arc<PathGuard>,
}

impl ListDirTool {
    pub fn new(guard: Arc<PathGuard>) -> Self {
        Self { guard }
    }
}

#[derive(Deserialize)]
struct ListDirArgs {
    path: String,
}

#[async_trait]
impl ToolTrait for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }
    fn description(&self) -> &str {
        "List the contents of a directory."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": { "path": { "type": "string", "description": "Directory path" } },
            "required": ["path"]
        })
    }
    async fn execute(
        &self,
        args: serde_json::Value,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let args: ListDirArgs = serde_json::from_value(args)?;
        let path = self.guard.resolve(&args.path)?;

        debug!("listing {:?}", path);
        if !path.exists() {
            return Ok(format!("No directory at: {}", args.path));
        }
        if !path.is_dir() {
            return Ok(format!("Not a directory: {}", args.path));
        }
        let mut entries = tokio::fs::read_dir(&path).await?;
        let mut items = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let prefix = if entry.file_type().await?.is_dir() {
                "[dir] "
            } else {
                "[file] "
            };
            items.push(format!("{}{}", prefix, name));
        }
        items.sort();
        if items.is_empty() {
            Ok(format!("Empty directory: {}", args.path))
        } else {
            Ok(items.join("\n"))
        }
    }
}
