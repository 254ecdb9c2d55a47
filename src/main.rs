use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use copilot_sandbox::registry::{Language, ToolKind};
use copilot_sandbox::search::{BingSearch, WebSearch};
use copilot_sandbox::tools::definitions;
use copilot_sandbox::{Dispatcher, ExecutionRequest, ExecutionResult, SandboxConfig};

// ============================================================================
// CLI Types
// ============================================================================

/// Run, lint and sanitize untrusted code in throwaway containers
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long, env = "COPILOT_SANDBOX_CONFIG", default_value = "copilot-sandbox.json")]
    config: PathBuf,

    /// Container CLI to use (overrides config file)
    #[arg(long, env = "COPILOT_SANDBOX_DOCKER")]
    docker_bin: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute one tool against a source file
    Run {
        #[arg(short, long, value_enum)]
        tool: ToolKind,

        #[arg(short, long, value_enum)]
        language: Language,

        /// Source file, or `-` for stdin
        #[arg(short, long)]
        file: PathBuf,

        /// Seconds before the sandbox is killed (overrides config file)
        #[arg(long)]
        timeout: Option<u64>,

        /// Human readable output instead of JSON
        #[arg(long)]
        pretty: bool,

        /// Arguments passed to the program
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Print the tool catalogue as function definitions
    Tools,

    /// Query the web-search helper
    Search {
        query: String,

        #[arg(short = 'n', long)]
        count: Option<u32>,

        #[arg(long, env = "COPILOT_SANDBOX_SEARCH_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = SandboxConfig::load(&cli.config)?;
    if let Some(bin) = cli.docker_bin {
        config.docker_bin = bin;
    }

    match cli.command {
        Commands::Run {
            tool,
            language,
            file,
            timeout,
            pretty,
            args,
        } => {
            let source = read_source(&file)?;
            let mut request = ExecutionRequest::new(tool, language, source).with_args(args);
            if let Some(secs) = timeout {
                request = request.with_timeout(Duration::from_secs(secs));
            }

            let dispatcher = Dispatcher::from_config(&config);
            let result = dispatcher.dispatch(request).await?;
            if pretty {
                print_pretty(&result);
            } else {
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            Ok(if result.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Tools => {
            println!("{}", serde_json::to_string_pretty(&definitions())?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Search {
            query,
            count,
            api_key,
        } => {
            if api_key.is_some() {
                config.search.api_key = api_key;
            }
            let search = BingSearch::new(&config.search)?;
            let count = count.unwrap_or(config.search.result_count);
            println!("{}", search.search(&query, count).await);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_source(file: &Path) -> Result<String> {
    if file.as_os_str() == "-" {
        let mut source = String::new();
        std::io::stdin()
            .read_to_string(&mut source)
            .context("Failed to read source from stdin")?;
        return Ok(source);
    }
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}

fn print_pretty(result: &ExecutionResult) {
    let status = match (result.success, result.issues_found) {
        (true, false) => "✅ success".green(),
        (true, true) => "⚠️  completed with findings".yellow(),
        (false, _) => "❌ failed".red(),
    };
    println!("{}", status.bold());
    if let Some(kind) = result.failure {
        println!("{} {:?}", "reason:".dimmed(), kind);
    }
    println!("{}", result.text());
}
