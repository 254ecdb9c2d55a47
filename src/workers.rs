//! Workers the supervisor can route a request to, and the tools each may call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::context::RequestContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Worker {
    /// Runs linters to find style errors.
    Linter,
    /// Generates, optimizes or explains code; calls no tools.
    Optimizer,
    /// Compiles and runs code under sanitizers.
    Sanitizer,
    /// Answers general and IDE questions, backed by web search.
    Helper,
}

/// Name of the web-search tool offered to the helper.
pub const SEARCH_TOOL: &str = "web_search";

impl Worker {
    pub const ALL: [Worker; 4] = [
        Worker::Linter,
        Worker::Optimizer,
        Worker::Sanitizer,
        Worker::Helper,
    ];

    pub fn tools(self) -> &'static [&'static str] {
        match self {
            Worker::Linter => &["lint_c", "lint_cpp", "lint_python"],
            Worker::Optimizer => &[],
            Worker::Sanitizer => &["sanitize_c", "sanitize_cpp", "run_python"],
            Worker::Helper => &[SEARCH_TOOL],
        }
    }

    pub fn may_call(self, tool: &str) -> bool {
        self.tools().contains(&tool)
    }
}

impl fmt::Display for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    Worker(Worker),
    Finish,
}

/// The supervisor: decides who acts next given the conversation so far.
/// Implemented outside this crate, typically by a language model.
#[async_trait]
pub trait Router: Send + Sync {
    async fn next(&self, ctx: &RequestContext) -> anyhow::Result<Route>;
}
