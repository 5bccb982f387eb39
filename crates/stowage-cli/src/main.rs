//! stowage CLI entrypoint.

use clap::Parser;
use std::path::PathBuf;
use stowage_trace::{init_tracer, shutdown_tracer, LogFormat, TracingConfig};

mod commands;
mod config;
mod handlers;

use commands::Commands;
use config::CliConfig;

#[derive(Parser)]
#[command(name = "stowage")]
#[command(author, version, about = "Remote cache for build outputs", long_about = None)]
struct Cli {
    /// Working directory that cached files are relative to
    #[arg(long, global = true)]
    cwd: Option<PathBuf>,

    /// Storage provider (local, local-skip, npm, azure-blob, s3)
    #[arg(long, global = true, env = "STOWAGE_CACHE_PROVIDER")]
    provider: Option<String>,

    /// Provider options as JSON
    #[arg(long, global = true, env = "STOWAGE_CACHE_PROVIDER_OPTIONS")]
    options: Option<String>,

    /// Path to the YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log format (text or json)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let file = CliConfig::load(cli.config.as_deref())?;

    let log_format = cli.log_format.or(file.log_format).unwrap_or_default();
    init_tracer(&TracingConfig::default().with_log_format(log_format))?;

    let settings = config::resolve_storage(cli.provider, cli.options, &file)?;
    let cwd = match cli.cwd {
        Some(cwd) => cwd,
        None => std::env::current_dir()?,
    };

    let result = match cli.command {
        Commands::Config => handlers::show_config(&settings),
        Commands::Fetch { hash } => {
            match handlers::open_storage(&settings, &file, &cwd).await {
                Ok(storage) => handlers::fetch(storage.as_ref(), &hash).await.map(|_| ()),
                Err(e) => Err(e),
            }
        }
        Commands::Put { hash, files } => {
            match handlers::open_storage(&settings, &file, &cwd).await {
                Ok(storage) => handlers::put(storage.as_ref(), &hash, &files).await,
                Err(e) => Err(e),
            }
        }
    };

    shutdown_tracer();
    result
}
