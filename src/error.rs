//! Sandbox error types and handling utilities
use std::time::Duration;

use crate::registry::{Language, ToolKind};
use crate::workers::Worker;

/// Errors raised by a container runtime backend.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The runtime binary or daemon could not be reached at all
    #[error("container runtime unavailable: {0}")]
    Unavailable(String),
    /// The runtime answered but the operation failed
    #[error("{operation} failed: {reason}")]
    OperationFailed { operation: String, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Main error type for sandbox operations
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// No pipeline registered for the requested pair; raised before provisioning
    #[error("unknown tool: no pipeline registered for {kind} on {language}")]
    UnknownTool { kind: ToolKind, language: Language },
    /// The agent asked for a tool name that is not in the catalogue
    #[error("unknown tool: {0}")]
    UnknownToolName(String),
    /// The tool exists but is not in the calling worker's tool set
    #[error("tool {tool} is not available to the {worker} worker")]
    ToolNotPermitted { worker: Worker, tool: String },
    /// Web search was requested but no search backend is configured
    #[error("web search is not configured")]
    SearchUnavailable,
    /// Source was empty once markdown fences were removed
    #[error("source code is empty after removing markdown fences")]
    EmptySource,
    /// Staging or container creation failed
    #[error("provisioning failed: {reason}")]
    Provision { reason: String, retryable: bool },
    /// The environment outlived the caller's deadline and was force-removed
    #[error("execution timed out after {}s and the sandbox was terminated", .0.as_secs_f64())]
    Timeout(Duration),
    /// Waiting for the exit status failed
    #[error("execution failed: {0}")]
    Execution(String),
    /// The combined output stream could not be read
    #[error("capture failed: {0}")]
    Capture(String),
}

impl SandboxError {
    pub(crate) fn provision(err: RuntimeError) -> Self {
        let retryable = matches!(err, RuntimeError::Unavailable(_));
        SandboxError::Provision {
            reason: err.to_string(),
            retryable,
        }
    }
}

/// Helper to determine if an error is worth retrying by the caller.
/// Sessions never retry on their own.
pub fn is_retryable(err: &SandboxError) -> bool {
    match err {
        SandboxError::Provision { retryable, .. } => *retryable,
        SandboxError::Timeout(_) => false,
        SandboxError::Execution(_) => true,
        SandboxError::Capture(_) => true,
        SandboxError::UnknownTool { .. } => false,
        SandboxError::UnknownToolName(_) => false,
        SandboxError::ToolNotPermitted { .. } => false,
        SandboxError::SearchUnavailable => false,
        SandboxError::EmptySource => false,
    }
}
