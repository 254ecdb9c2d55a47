use serde::{Deserialize, Serialize};

use crate::error::SandboxError;
use crate::search::SEARCH_FAILED;

/// Closed set of reasons a tool invocation did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NonZeroExit,
    EmptySource,
    Provision,
    Timeout,
    Execution,
    Capture,
    UnknownTool,
    NotPermitted,
}

impl From<&SandboxError> for FailureKind {
    fn from(err: &SandboxError) -> Self {
        match err {
            SandboxError::UnknownTool { .. } | SandboxError::UnknownToolName(_) => {
                FailureKind::UnknownTool
            }
            SandboxError::ToolNotPermitted { .. } => FailureKind::NotPermitted,
            SandboxError::SearchUnavailable => FailureKind::Provision,
            SandboxError::EmptySource => FailureKind::EmptySource,
            SandboxError::Provision { .. } => FailureKind::Provision,
            SandboxError::Timeout(_) => FailureKind::Timeout,
            SandboxError::Execution(_) => FailureKind::Execution,
            SandboxError::Capture(_) => FailureKind::Capture,
        }
    }
}

/// The uniform shape every tool hands back to the agent layer.
///
/// Exactly one of `output` and `error` is set. For lint tools `success`
/// means the linter ran to completion; `issues_found` says whether it
/// reported anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub issues_found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl ExecutionResult {
    pub fn passed(output: String, exit_code: i64) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
            issues_found: false,
            exit_code: Some(exit_code),
            failure: None,
        }
    }

    pub fn with_findings(output: String, exit_code: i64) -> Self {
        Self {
            issues_found: true,
            ..Self::passed(output, exit_code)
        }
    }

    pub fn non_zero_exit(captured: String, exit_code: i64) -> Self {
        let error = if captured.is_empty() {
            format!("process exited with status {}", exit_code)
        } else {
            captured
        };
        Self {
            success: false,
            output: None,
            error: Some(error),
            issues_found: false,
            exit_code: Some(exit_code),
            failure: Some(FailureKind::NonZeroExit),
        }
    }

    pub fn from_error(err: &SandboxError) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(err.to_string()),
            issues_found: false,
            exit_code: None,
            failure: Some(FailureKind::from(err)),
        }
    }

    /// Wrap the text a web search returned. The search helper reports its own
    /// failures in-band, so those are recognised by their prefix.
    pub fn from_search(text: String) -> Self {
        if text.starts_with(SEARCH_FAILED) {
            return Self {
                success: false,
                output: None,
                error: Some(text),
                issues_found: false,
                exit_code: None,
                failure: Some(FailureKind::Execution),
            };
        }
        Self {
            success: true,
            output: Some(text),
            error: None,
            issues_found: false,
            exit_code: None,
            failure: None,
        }
    }

    /// Text for the caller regardless of outcome.
    pub fn text(&self) -> &str {
        self.output
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or_default()
    }
}
