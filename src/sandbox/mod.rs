use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::registry::{Language, ToolKind};

pub mod session;
pub mod staging;

pub use session::{SandboxSession, SessionOptions};
pub use staging::StagedSource;

/// One tool invocation as the agent layer hands it over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub tool_kind: ToolKind,
    pub language: Language,
    pub source_code: String,
    #[serde(default)]
    pub program_args: Vec<String>,
    /// Caller deadline; falls back to the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl ExecutionRequest {
    pub fn new(tool_kind: ToolKind, language: Language, source_code: impl Into<String>) -> Self {
        Self {
            tool_kind,
            language,
            source_code: source_code.into(),
            program_args: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.program_args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Lifecycle of a sandbox session. `Aborted` is terminal and reachable from
/// every other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Provisioning,
    Running,
    Captured,
    TornDown,
    Aborted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
