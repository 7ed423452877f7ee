//! Capability dispatch.
//!
//! A capability is a value implementing [`ToolTrait`]; the dispatcher is a
//! plain name-to-capability map. `dispatch` turns every invocation request
//! into exactly one [`ToolResult`] — unknown names, argument mismatches,
//! returned errors, and panics all come back as error-status results, so a
//! misbehaving capability can never take the run loop down with it.

pub mod calculator;
pub mod datetime;
pub mod filesystem;
pub mod path_guard;
pub mod shell;
pub mod web;

pub use calculator::CalculatorTool;
pub use datetime::{CurrentTimeTool, DateCalculatorTool};
pub use filesystem::{EditFileTool, ListDirTool, ReadFileTool, WriteFileTool};
pub use path_guard::PathGuard;
pub use shell::ExecTool;
pub use web::{WebFetchTool, WebSearchTool};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use kestrel_config::Config;
use kestrel_provider::{Tool, ToolCall};

use crate::AgentError;

#[async_trait]
pub trait ToolTrait: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;
    async fn execute(
        &self,
        args: Value,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

pub fn to_provider_tool(tool: &dyn ToolTrait) -> Tool {
    Tool::new(tool.name(), tool.description(), tool.parameters())
}

/// Outcome status of one dispatched invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Success,
    Error,
}

/// The single result every dispatched invocation produces
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub name: String,
    pub status: ToolStatus,
    pub output: String,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ToolStatus::Success,
            output: output.into(),
        }
    }

    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ToolStatus::Error,
            output: format!("Error: {}", message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }
}

/// Name-to-capability registry with a dispatch boundary
pub struct ToolDispatcher {
    tools: HashMap<String, Arc<dyn ToolTrait>>,
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register<T: ToolTrait + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolTrait> {
        self.tools.get(name).map(|t| t.as_ref() as &dyn ToolTrait)
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Export the registered set in the model-facing wire format
    pub fn definitions(&self) -> Vec<Tool> {
        self.tools
            .values()
            .map(|t| to_provider_tool(t.as_ref()))
            .collect()
    }

    /// Resolve, validate, and execute one invocation request.
    ///
    /// Every failure mode is captured here and reified as an error-status
    /// result; nothing propagates to the caller.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        match self.try_dispatch(call).await {
            Ok(output) => ToolResult::success(&call.name, output),
            Err(e) => {
                warn!("capability {} yielded error: {}", call.name, e);
                ToolResult::error(&call.name, e.to_string())
            }
        }
    }

    async fn try_dispatch(&self, call: &ToolCall) -> crate::Result<String> {
        let Some(tool) = self.tools.get(&call.name) else {
            return Err(AgentError::UnknownCapability(call.name.clone()));
        };

        validate_arguments(&tool.parameters(), &call.arguments).map_err(|reason| {
            AgentError::InvalidArguments {
                name: call.name.clone(),
                reason,
            }
        })?;

        debug!("executing capability {}", call.name);
        // The body runs on its own task so a panic surfaces as a join
        // error instead of unwinding through the loop
        let tool = Arc::clone(tool);
        let args = call.arguments.clone();
        let handle = tokio::spawn(async move { tool.execute(args).await });

        match handle.await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(AgentError::ToolExecution {
                name: call.name.clone(),
                reason: e.to_string(),
            }),
            Err(e) => Err(AgentError::ToolExecution {
                name: call.name.clone(),
                reason: format!("capability crashed: {}", e),
            }),
        }
    }
}

impl Default for ToolDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Check an argument payload against a capability's declared JSON schema:
/// the payload must be an object, every required key must be present, and
/// declared property types must match.
fn validate_arguments(schema: &Value, args: &Value) -> Result<(), String> {
    let Some(object) = args.as_object() else {
        return Err("argument payload must be a JSON object".to_string());
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(key) {
                return Err(format!("missing required field '{}'", key));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (key, value) in object {
            let declared = properties
                .get(key)
                .and_then(|p| p.get("type"))
                .and_then(Value::as_str);
            if let Some(declared) = declared {
                if !json_type_matches(declared, value) {
                    return Err(format!("field '{}' must be of type {}", key, declared));
                }
            }
        }
    }

    Ok(())
}

fn json_type_matches(declared: &str, value: &Value) -> bool {
    match declared {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

/// Register the standard capability set from configuration
pub fn register_default_tools(
    dispatcher: &mut ToolDispatcher,
    config: &Config,
    guard: Arc<PathGuard>,
) {
    // Filesystem capabilities share one guard
    dispatcher.register(ReadFileTool::new(Arc::clone(&guard)));
    dispatcher.register(WriteFileTool::new(Arc::clone(&guard)));
    dispatcher.register(EditFileTool::new(Arc::clone(&guard)));
    dispatcher.register(ListDirTool::new(Arc::clone(&guard)));

    dispatcher.register(ExecTool::new(Arc::clone(&guard), config.workspace_path()));

    dispatcher.register(CalculatorTool);
    dispatcher.register(CurrentTimeTool);
    dispatcher.register(DateCalculatorTool);

    dispatcher.register(WebSearchTool::new(
        config.web_search_api_key(),
        config.web_search_max_results(),
    ));
    dispatcher.register(WebFetchTool::default());
}
