//! Tracefix CLI - diagnose a stack trace and get a proposed fix.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod commands;

/// Tracefix - local log cleaning plus remote fix suggestions
#[derive(Parser)]
#[command(name = "tracefix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize an error log and ask for a fix to the given code
    Diagnose {
        /// File with the relevant source code ("-" for stdin)
        #[arg(short, long)]
        code: PathBuf,
        /// File with the full error log or traceback ("-" for stdin)
        #[arg(short, long)]
        log: PathBuf,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Run the pipeline on a bundled sample traceback
    Demo {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Check that the local model server and API key are ready
    Check {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Show the effective configuration
    Info {
        #[command(flatten)]
        overrides: Overrides,
    },
}

/// Settings that take precedence over the environment.
#[derive(Args, Debug, Default)]
pub(crate) struct Overrides {
    /// Local Ollama model used to clean the log
    #[arg(long)]
    local_model: Option<String>,
    /// Ollama server address
    #[arg(long)]
    local_endpoint: Option<String>,
    /// Seconds to wait for the local model
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    local_timeout: Option<u64>,
    /// Remote chat model used to propose the fix
    #[arg(long)]
    remote_model: Option<String>,
    /// Base URL of the remote chat completions API
    #[arg(long)]
    remote_url: Option<String>,
    /// Seconds to wait for the remote model
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    remote_timeout: Option<u64>,
    /// API key for the remote service (default: DEEPSEEK_API_KEY)
    #[arg(long)]
    api_key: Option<String>,
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "warn" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    // A missing .env is fine; variables may come from the shell.
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!("loaded environment from {}", path.display());
    }

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| miette::miette!("Failed to start async runtime: {}", e))?;

    match cli.command {
        Commands::Diagnose {
            code,
            log,
            json,
            overrides,
        } => runtime.block_on(commands::diagnose::run(&code, &log, json, &overrides)),
        Commands::Demo { overrides } => runtime.block_on(commands::demo::run(&overrides)),
        Commands::Check { overrides } => runtime.block_on(commands::check::run(&overrides)),
        Commands::Info { overrides } => commands::info::run(&overrides),
    }
}
