//! Named, schema-described tools exposed to the orchestration layer.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::registry::{Language, ToolKind};
use crate::sandbox::ExecutionRequest;
use crate::workers::SEARCH_TOOL;

/// Static description of one callable tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ToolKind,
    pub language: Language,
}

pub const TOOL_CATALOGUE: &[ToolSpec] = &[
    ToolSpec {
        name: "run_python",
        description: "Run a Python program in an isolated container and return its output.",
        kind: ToolKind::Run,
        language: Language::Python,
    },
    ToolSpec {
        name: "lint_python",
        description: "Run pylint on Python code and report style and static-analysis findings.",
        kind: ToolKind::LintStyle,
        language: Language::Python,
    },
    ToolSpec {
        name: "lint_c",
        description: "Run clang-tidy, clang-format and cppcheck on C code to find style errors.",
        kind: ToolKind::LintStyle,
        language: Language::C,
    },
    ToolSpec {
        name: "lint_cpp",
        description: "Run clang-tidy, clang-format and cppcheck on C++ code to find style errors.",
        kind: ToolKind::LintStyle,
        language: Language::Cpp,
    },
    ToolSpec {
        name: "sanitize_c",
        description: "Compile C code with address and undefined-behaviour sanitizers, run it, \
                      then run a plain build under valgrind to find leaks and uninitialised reads.",
        kind: ToolKind::SanitizeMemory,
        language: Language::C,
    },
    ToolSpec {
        name: "sanitize_cpp",
        description: "Compile C++ code with address and undefined-behaviour sanitizers, run it, \
                      then run a plain build under valgrind to find leaks and uninitialised reads.",
        kind: ToolKind::SanitizeMemory,
        language: Language::Cpp,
    },
];

pub fn find_tool(name: &str) -> Option<&'static ToolSpec> {
    TOOL_CATALOGUE.iter().find(|t| t.name == name)
}

/// Arguments every tool accepts. For web search `code` carries the query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolArgs {
    #[serde(alias = "query")]
    pub code: String,
    #[serde(default)]
    pub params: Vec<String>,
}

/// Function definition of the helper's web-search tool.
pub fn search_definition() -> Value {
    json!({
        "name": SEARCH_TOOL,
        "description": "Search the web and return the top results with title, snippet and link.",
        "parameters": {
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query." }
            },
            "required": ["query"]
        }
    })
}

/// Every definition an agent can be offered: the sandbox catalogue plus search.
pub fn definitions() -> Vec<Value> {
    TOOL_CATALOGUE
        .iter()
        .map(ToolSpec::definition)
        .chain(std::iter::once(search_definition()))
        .collect()
}

impl ToolSpec {
    /// Function definition in the JSON-schema form tool-calling models expect.
    pub fn definition(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": {
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "Complete source code; markdown code fences are removed."
                    },
                    "params": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Command line arguments passed to the program."
                    }
                },
                "required": ["code"]
            }
        })
    }

    pub fn request(&self, args: ToolArgs) -> ExecutionRequest {
        ExecutionRequest::new(self.kind, self.language, args.code).with_args(args.params)
    }
}
