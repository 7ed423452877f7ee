//! Kestrel agent core.
//!
//! Context assembly, capability dispatch, and the tool-calling run loop.

use thiserror::Error;

pub mod context;
pub mod loop_agent;
pub mod tools;

pub use context::{ContextMemory, FileContext};
pub use loop_agent::{AgentLoop, RunOutcome, StopReason};
pub use tools::{ToolDispatcher, ToolResult, ToolStatus, ToolTrait};

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("path outside allowed roots: {0}")]
    PathDenied(String),

    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    #[error("invalid arguments for {name}: {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("capability {name} failed: {reason}")]
    ToolExecution { name: String, reason: String },

    #[error("provider call failed: {0}")]
    Provider(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
