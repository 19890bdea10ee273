//! AutoDPIA CLI
//!
//! Main entry point for the autodpia command-line tool.
//! Provides commands for managing and editing DPIA report templates.

mod commands;

use autodpia_core::{config::AppConfig, logging, AppResult};
use clap::{Parser, Subcommand};
use commands::{AuthCommand, TemplateCommand};
use std::path::PathBuf;

/// AutoDPIA CLI - edit the templates that drive DPIA report generation
#[derive(Parser, Debug)]
#[command(name = "autodpia")]
#[command(about = "Edit the templates that drive DPIA report generation", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "AUTODPIA_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "AUTODPIA_CONFIG")]
    config: Option<PathBuf>,

    /// AutoDPIA server URL
    #[arg(short, long, global = true, env = "AUTODPIA_SERVER")]
    server: Option<String>,

    /// Template storage backend (remote, local)
    #[arg(short, long, global = true, env = "AUTODPIA_BACKEND")]
    backend: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in, register and manage the stored session
    Auth(AuthCommand),

    /// List, inspect and edit templates
    Template(TemplateCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from environment
    let config = AppConfig::load()?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.server,
        cli.backend,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("AutoDPIA CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Server: {}", config.server_url);
    tracing::debug!("Backend: {}", config.backend);

    config.validate()?;
    config.ensure_autodpia_dir()?;

    let command_name = match &cli.command {
        Commands::Auth(_) => "auth",
        Commands::Template(_) => "template",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Auth(cmd) => cmd.execute(&config).await,
        Commands::Template(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
