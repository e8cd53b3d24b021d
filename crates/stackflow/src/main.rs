mod commands;
mod context;
mod program;
mod sink;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackflow")]
#[command(
    about = "Select or create a stack, configure it, refresh it and bring it up to date",
    long_about = None
)]
struct Cli {
    /// State backend directory (default: the project's backend or ./.stackflow)
    #[arg(long, global = true, env = "STACKFLOW_BACKEND", value_name = "DIR")]
    backend: Option<PathBuf>,

    /// Stack name (default: dev)
    #[arg(short = 's', long, global = true, env = "STACKFLOW_STACK")]
    stack: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select or create the stack, apply configuration, refresh and update it
    Up {
        /// Extra configuration applied after the project file (repeatable)
        #[arg(short = 'c', long = "config", value_name = "KEY=VALUE")]
        config: Vec<String>,
    },
    /// Show what an update would change
    Preview,
    /// Reconcile recorded state with the live resources
    Refresh,
    /// Delete every resource of the stack
    Destroy {
        /// Run without confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Show the outputs of the last update
    Outputs {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage stack configuration
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Manage stacks
    #[command(subcommand)]
    Stack(StackCommands),
    /// Show version information
    Version,
}

/// Stack configuration subcommands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// List the configuration of the stack
    List,
    /// Print one configuration value
    Get {
        /// Key, e.g. aws:region
        key: String,
    },
    /// Set a configuration value
    Set {
        key: String,
        value: String,
        /// Store as a secret (masked in listings)
        #[arg(long)]
        secret: bool,
    },
    /// Remove a configuration value
    Rm { key: String },
}

/// Stack management subcommands
#[derive(Subcommand)]
pub enum StackCommands {
    /// List the stacks of the project
    Ls,
    /// Remove a stack's state
    Rm {
        name: String,
        /// Remove even if the stack still records resources
        #[arg(short, long)]
        force: bool,
    },
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the step diagnostics
    init_logging();

    // Version needs no project
    if matches!(cli.command, Commands::Version) {
        println!("stackflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let ctx = context::CliContext::load(cli.backend.as_deref(), cli.stack)?;

    match cli.command {
        Commands::Up { config } => {
            let code = commands::up::handle(&ctx, &config).await?;
            if code != stackflow_cloud::EXIT_OK {
                std::process::exit(code);
            }
        }
        Commands::Preview => commands::preview::handle(&ctx).await?,
        Commands::Refresh => {
            let code = commands::refresh::handle(&ctx).await?;
            if code != stackflow_cloud::EXIT_OK {
                std::process::exit(code);
            }
        }
        Commands::Destroy { yes } => commands::destroy::handle(&ctx, yes).await?,
        Commands::Outputs { json } => commands::outputs::handle(&ctx, json).await?,
        Commands::Config(cmd) => commands::config::handle(&ctx, cmd).await?,
        Commands::Stack(cmd) => commands::stack::handle(&ctx, cmd).await?,
        Commands::Version => {
            unreachable!("Version is handled before project loading");
        }
    }

    Ok(())
}
