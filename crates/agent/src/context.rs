//! Conversation memory and context assembly.
//!
//! `ContextMemory` owns the append-only conversation log and a keyed set of
//! file references. `assemble` produces the exact message sequence sent to
//! the model each turn, in a fixed order: the system directive first, then
//! the synthesized file-context block (only when files exist), then the log
//! in append order. Reference material precedes volatile history on purpose;
//! the order is an invariant of this module, not of whoever fed it.

use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use tracing::debug;

use kestrel_provider::{validate_call_id, Message, ToolCallDef};

use crate::tools::ToolResult;

/// One tracked file reference. Keyed by path; re-adding a path replaces
/// the whole entry.
#[derive(Debug, Clone)]
pub struct FileContext {
    pub path: String,
    pub content: Option<String>,
    pub summary: String,
    pub metadata: Option<BTreeMap<String, String>>,
    pub updated_at: DateTime<Local>,
}

/// Conversation log plus file references
pub struct ContextMemory {
    system_prompt: String,
    log: Vec<Message>,
    files: BTreeMap<String, FileContext>,
    file_content_max_chars: usize,
}

impl ContextMemory {
    pub fn new(system_prompt: impl Into<String>, file_content_max_chars: usize) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            log: Vec::new(),
            files: BTreeMap::new(),
            file_content_max_chars,
        }
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = prompt.into();
    }

    /// Append a message to the conversation log
    pub fn append(&mut self, message: Message) {
        self.log.push(message);
    }

    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.append(Message::user(content));
    }

    pub fn add_assistant_message(
        &mut self,
        content: Option<&str>,
        tool_calls: Option<Vec<ToolCallDef>>,
    ) {
        let mut msg = Message::assistant(content.unwrap_or(""));
        if let Some(calls) = tool_calls {
            msg.tool_calls = Some(calls);
        }
        self.append(msg);
    }

    /// Record a tool result as a tool message. The invocation identifier is
    /// attached only when it passes validation; otherwise the message goes
    /// in without one.
    pub fn record_tool_result(&mut self, result: &ToolResult, call_id: Option<&str>) {
        let mut msg = Message::tool_result(&result.name, &result.output);
        if let Some(valid) = call_id.and_then(validate_call_id) {
            msg.tool_call_id = Some(valid.to_string());
        } else if let Some(raw) = call_id {
            debug!("dropping non-conforming call id {:?}", raw);
        }
        self.append(msg);
    }

    /// Insert or fully replace a file reference keyed by path
    pub fn upsert_file(
        &mut self,
        path: impl Into<String>,
        content: Option<String>,
        summary: impl Into<String>,
        metadata: Option<BTreeMap<String, String>>,
    ) {
        let path = path.into();
        let entry = FileContext {
            path: path.clone(),
            content,
            summary: summary.into(),
            metadata,
            updated_at: Local::now(),
        };
        self.files.insert(path, entry);
    }

    pub fn log(&self) -> &[Message] {
        &self.log
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn file(&self, path: &str) -> Option<&FileContext> {
        self.files.get(path)
    }

    /// One line per tracked file, for the interactive `files` command
    pub fn files_summary(&self) -> String {
        if self.files.is_empty() {
            return "No files in context".to_string();
        }
        let mut lines = vec![format!("{} file(s) in context:", self.files.len())];
        for file in self.files.values() {
            let size = file
                .content
                .as_ref()
                .map(|c| format!("{} chars", c.chars().count()))
                .unwrap_or_else(|| "no content".to_string());
            lines.push(format!(
                "- {} ({}, updated {})",
                file.path,
                size,
                file.updated_at.format("%Y-%m-%d %H:%M:%S")
            ));
        }
        lines.join("\n")
    }

    /// Drop the conversation log and tracked files, keeping the system
    /// prompt
    pub fn clear(&mut self) {
        self.log.clear();
        self.files.clear();
    }

    /// Produce the message sequence for one model call:
    /// [system] + [file context, iff any files] + [log in append order]
    pub fn assemble(&self) -> Vec<Message> {
        let mut messages = vec![Message::system(&self.system_prompt)];
        if !self.files.is_empty() {
            messages.push(Message::system(self.render_file_context()));
        }
        messages.extend(self.log.iter().cloned());
        messages
    }

    fn render_file_context(&self) -> String {
        let mut out = String::from("# File context\n");
        for file in self.files.values() {
            out.push_str(&format!("\n## {}\n", file.path));
            out.push_str(&format!(
                "Updated: {}\n",
                file.updated_at.format("%Y-%m-%d %H:%M:%S")
            ));
            out.push_str(&format!("Summary: {}\n", file.summary));
            if let Some(meta) = &file.metadata {
                for (key, value) in meta {
                    out.push_str(&format!("{}: {}\n", key, value));
                }
            }
            if let Some(content) = &file.content {
                out.push_str("Content:\n");
                out.push_str(&truncate_middle(content, self.file_content_max_chars));
                out.push('\n');
            }
        }
        out
    }
}

/// Derive a short summary from file content, for entries tracked
/// automatically by the loop
pub fn summarize(content: &str) -> String {
    const SUMMARY_CHARS: usize = 200;
    let head: String = content.chars().take(SUMMARY_CHARS).collect();
    if content.chars().count() > SUMMARY_CHARS {
        format!("{}...", head.trim_end())
    } else {
        head
    }
}

/// Bound `text` to roughly `max_chars` characters by keeping its head and
/// tail halves around an elision marker. Operates on chars, so multi-byte
/// content never splits mid-character.
fn truncate_middle(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let head_len = max_chars / 2;
    let tail_len = max_chars - head_len;
    let head: String = text.chars().take(head_len).collect();
    let tail: String = text.chars().skip(total - tail_len).collect();
    format!(
        "{}\n... [{} chars elided] ...\n{}",
        head,
        total - head_len - tail_len,
        tail
    )
}
