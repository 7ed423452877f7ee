//! Agent loop - core processing engine.
//!
//! Drives Thinking → Dispatching → Observing cycles over one conversation:
//! assemble context, call the provider, execute any invocation requests in
//! the order the model gave them, feed results back, repeat until the model
//! finishes or the iteration budget runs out. Tool failures stay inside the
//! loop as transcript text; a provider failure is fatal and surfaces as an
//! error, with retry policy left to the caller.

use std::sync::Arc;

use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use kestrel_config::Config;
use kestrel_provider::{
    placeholder_call_id, ChatParams, Provider, ToolCallDef, ToolChoice,
};

use crate::context::{summarize, ContextMemory};
use crate::tools::{self, PathGuard, ToolDispatcher};

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model produced a final answer
    Done,
    /// The iteration budget ran out before a final answer
    BudgetExhausted,
    /// The cancellation token fired
    Cancelled,
}

/// Terminal outcome of one run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub answer: String,
    pub reason: StopReason,
    pub iterations: u32,
}

/// One conversation's loop. Owns its context and dispatcher; concurrent
/// conversations get separate instances.
pub struct AgentLoop<P: Provider> {
    provider: Arc<P>,
    model: String,
    max_iterations: u32,
    max_tokens: u32,
    temperature: f32,
    context: ContextMemory,
    dispatcher: ToolDispatcher,
    cancel: CancellationToken,
}

impl<P: Provider> AgentLoop<P> {
    /// Build a loop with the standard capability set from configuration
    pub fn from_config(provider: P, config: &Config) -> Self {
        let guard = Arc::new(PathGuard::new(config.allowed_roots()));
        let mut dispatcher = ToolDispatcher::new();
        tools::register_default_tools(&mut dispatcher, config, guard);

        let context = ContextMemory::new(system_prompt(config), config.file_context_max_chars());

        Self {
            provider: Arc::new(provider),
            model: config.default_model(),
            max_iterations: config.max_tool_iterations(),
            max_tokens: config.max_tokens(),
            temperature: config.temperature(),
            context,
            dispatcher,
            cancel: CancellationToken::new(),
        }
    }

    /// Build a loop from explicit parts
    pub fn new(
        provider: P,
        model: impl Into<String>,
        max_iterations: u32,
        context: ContextMemory,
        dispatcher: ToolDispatcher,
    ) -> Self {
        Self {
            provider: Arc::new(provider),
            model: model.into(),
            max_iterations: max_iterations.max(1),
            max_tokens: 4096,
            temperature: 0.7,
            context,
            dispatcher,
            cancel: CancellationToken::new(),
        }
    }

    /// Token for cancelling this loop from outside. Checked at the top of
    /// each Thinking phase; in-flight tool executions complete first.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn context(&self) -> &ContextMemory {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ContextMemory {
        &mut self.context
    }

    /// Process one user request to a terminal outcome
    pub async fn run(&mut self, user_input: &str) -> crate::Result<RunOutcome> {
        let request_id = generate_request_id();
        info!("[{}] starting run", request_id);

        self.context.add_user_message(user_input);

        let mut iterations = 0u32;
        loop {
            // Thinking
            if self.cancel.is_cancelled() {
                warn!("[{}] cancelled after {} iterations", request_id, iterations);
                return Ok(RunOutcome {
                    answer: "Run cancelled.".to_string(),
                    reason: StopReason::Cancelled,
                    iterations,
                });
            }

            iterations += 1;
            debug!("[{}] iteration {}/{}", request_id, iterations, self.max_iterations);

            let params = ChatParams {
                model: self.model.clone(),
                messages: self.context.assemble(),
                tools: self.dispatcher.definitions(),
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                tool_choice: ToolChoice::Auto,
            };

            // Transport faults are fatal here; no retry at this level
            let response = self
                .provider
                .chat(params)
                .await
                .map_err(|e| crate::AgentError::Provider(e.to_string()))?;

            if !response.has_tool_calls() {
                let answer = response
                    .content
                    .unwrap_or_else(|| "Task completed.".to_string());
                self.context.add_assistant_message(Some(&answer), None);
                info!("[{}] done after {} iterations", request_id, iterations);
                return Ok(RunOutcome {
                    answer,
                    reason: StopReason::Done,
                    iterations,
                });
            }

            // Dispatching: requests run in the order the model gave them,
            // and results re-attach in that same order
            let mut calls = response.tool_calls;
            for (index, call) in calls.iter_mut().enumerate() {
                if call.id.is_empty() {
                    call.id = placeholder_call_id(&call.name, index);
                }
            }

            let defs: Vec<ToolCallDef> = calls
                .iter()
                .map(|c| ToolCallDef::new(&c.id, &c.name, c.arguments.clone()))
                .collect();
            self.context
                .add_assistant_message(response.content.as_deref(), Some(defs));

            for call in &calls {
                debug!("[{}] dispatching {}", request_id, call.name);
                let result = self.dispatcher.dispatch(call).await;

                // Successful reads become tracked file references, so later
                // turns see the file block instead of transcript scrollback
                if result.is_success() && call.name == "read_file" {
                    if let Some(path) = call.arguments.get("path").and_then(|v| v.as_str()) {
                        self.context.upsert_file(
                            path,
                            Some(result.output.clone()),
                            summarize(&result.output),
                            None,
                        );
                    }
                }

                self.context.record_tool_result(&result, Some(&call.id));
            }

            // Observing
            if iterations >= self.max_iterations {
                warn!(
                    "[{}] iteration budget of {} exhausted",
                    request_id, self.max_iterations
                );
                return Ok(RunOutcome {
                    answer: "Reached the iteration budget before a final answer.".to_string(),
                    reason: StopReason::BudgetExhausted,
                    iterations,
                });
            }
        }
    }
}

fn generate_request_id() -> String {
    format!(
        "req_{}_{}",
        Local::now().format("%Y%m%d%H%M%S"),
        &Uuid::new_v4().simple().to_string()[..8]
    )
}

fn system_prompt(config: &Config) -> String {
    let now = Local::now().format("%Y-%m-%d %H:%M (%A)");
    let workspace = config.workspace_path();

    format!(
        r#"# kestrel

You are kestrel, a helpful AI assistant. You have access to tools that let you:
- Read, write, and edit files inside your allowed directories
- Execute shell commands
- Evaluate arithmetic and work with dates
- Search the web and fetch web pages

## Current Time
{}

## Workspace
Your workspace is at: {}

When responding to direct questions, reply with your text response. Use tools
only when the task needs them, and explain what you are doing when you do.
Be helpful, accurate, and concise."#,
        now,
        workspace.display()
    )
}
