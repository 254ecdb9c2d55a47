use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::config::ImageConfig;
use crate::error::SandboxError;

/// Where compiled programs are written inside the container.
const PROGRAM_PATH: &str = "/tmp/program";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Run,
    #[value(name = "lint")]
    #[serde(rename = "lint")]
    LintStyle,
    #[value(name = "sanitize")]
    #[serde(rename = "sanitize")]
    SanitizeMemory,
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ToolKind::Run => "run",
            ToolKind::LintStyle => "lint",
            ToolKind::SanitizeMemory => "sanitize",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    C,
    Cpp,
    Python,
}

impl Language {
    /// File extension used for the staged source.
    pub fn extension(self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Python => "py",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Python => "python",
        };
        f.write_str(name)
    }
}

/// How a pipeline's final exit status maps onto the result contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPolicy {
    /// Any non-zero exit is a failure.
    Strict,
    /// Non-zero exits are linter findings unless a bit of `failure_mask` is
    /// set or the shell reports a missing command or a signal (>= 126).
    Findings { failure_mask: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    Clean,
    Findings,
    Failed,
}

impl ExitPolicy {
    pub fn classify(self, exit_code: i64) -> ExitClass {
        if exit_code == 0 {
            return ExitClass::Clean;
        }
        match self {
            ExitPolicy::Strict => ExitClass::Failed,
            ExitPolicy::Findings { failure_mask } => {
                if !(1..126).contains(&exit_code) || exit_code & failure_mask != 0 {
                    ExitClass::Failed
                } else {
                    ExitClass::Findings
                }
            }
        }
    }
}

/// A toolchain's image plus its ordered shell pipeline.
///
/// Steps may reference `{src}` (the staged source inside the container),
/// `{args}` (the quoted program arguments) and `{bin}` (the build output).
#[derive(Debug, Clone)]
pub struct CommandTemplate {
    pub image: String,
    pub steps: Vec<String>,
    pub exit_policy: ExitPolicy,
    /// Run the captured output through the lint report formatter.
    pub format_report: bool,
}

impl CommandTemplate {
    pub fn new(image: impl Into<String>, steps: &[&str]) -> Self {
        Self {
            image: image.into(),
            steps: steps.iter().map(|s| s.to_string()).collect(),
            exit_policy: ExitPolicy::Strict,
            format_report: false,
        }
    }

    pub fn with_exit_policy(mut self, policy: ExitPolicy) -> Self {
        self.exit_policy = policy;
        self
    }

    pub fn with_report_formatting(mut self) -> Self {
        self.format_report = true;
        self
    }

    /// Render the pipeline as a single `&&`-joined shell command, so the
    /// first failing step aborts the rest and decides the exit status.
    pub fn render(&self, source_path: &str, args: &[String]) -> String {
        let quoted_args = args
            .iter()
            .map(|a| shell_quote(a))
            .collect::<Vec<_>>()
            .join(" ");
        let source = shell_quote(source_path);

        self.steps
            .iter()
            .map(|step| {
                step.replace("{src}", &source)
                    .replace("{bin}", PROGRAM_PATH)
                    .replace("{args}", &quoted_args)
                    .trim_end()
                    .to_string()
            })
            .collect::<Vec<_>>()
            .join(" && ")
    }
}

/// Quote a word for `sh -c`, leaving obviously safe words untouched.
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:,+@%".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Static mapping from (tool kind, language) to a command template.
/// Built once and read concurrently without locking.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    entries: HashMap<(ToolKind, Language), CommandTemplate>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four toolchains the copilot ships with.
    pub fn builtin(images: &ImageConfig) -> Self {
        let mut registry = Self::new();

        registry.register(
            ToolKind::Run,
            Language::Python,
            CommandTemplate::new(&images.python_runtime, &["python3 {src} {args}"]),
        );

        registry.register(
            ToolKind::LintStyle,
            Language::Python,
            CommandTemplate::new(&images.python_lint, &["pylint --score=y {src}"])
                // pylint: 1 = fatal, 32 = usage error; the other bits are findings
                .with_exit_policy(ExitPolicy::Findings { failure_mask: 1 | 32 })
                .with_report_formatting(),
        );

        for (language, compiler, standard, image) in [
            (Language::C, "gcc", "c17", &images.c_toolchain),
            (Language::Cpp, "g++", "c++17", &images.cpp_toolchain),
        ] {
            let lint = [
                format!("clang-tidy {{src}} -- -std={standard}"),
                "clang-format --dry-run --Werror {src}".to_string(),
                "cppcheck --enable=all --error-exitcode=1 --suppress=missingIncludeSystem {src}"
                    .to_string(),
            ];
            let lint: Vec<&str> = lint.iter().map(String::as_str).collect();
            registry.register(
                ToolKind::LintStyle,
                language,
                CommandTemplate::new(image, &lint)
                    .with_exit_policy(ExitPolicy::Findings { failure_mask: 0 })
                    .with_report_formatting(),
            );

            let sanitize = [
                format!(
                    "{compiler} -std={standard} -g -O0 -fsanitize=address,undefined \
                     -fno-sanitize-recover=undefined -fno-omit-frame-pointer -o {{bin}}-asan {{src}}"
                ),
                "{bin}-asan {args}".to_string(),
                format!("{compiler} -std={standard} -g -O0 -o {{bin}} {{src}}"),
                "valgrind --leak-check=full --show-leak-kinds=all --track-origins=yes \
                 --error-exitcode=1 {bin} {args}"
                    .to_string(),
            ];
            let sanitize: Vec<&str> = sanitize.iter().map(String::as_str).collect();
            registry.register(
                ToolKind::SanitizeMemory,
                language,
                CommandTemplate::new(image, &sanitize),
            );
        }

        registry
    }

    pub fn register(&mut self, kind: ToolKind, language: Language, template: CommandTemplate) {
        self.entries.insert((kind, language), template);
    }

    pub fn resolve(&self, kind: ToolKind, language: Language) -> Result<&CommandTemplate, SandboxError> {
        self.entries
            .get(&(kind, language))
            .ok_or(SandboxError::UnknownTool { kind, language })
    }

    pub fn pairs(&self) -> impl Iterator<Item = (ToolKind, Language)> + '_ {
        self.entries.keys().copied()
    }
}
