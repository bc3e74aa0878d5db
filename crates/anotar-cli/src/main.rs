//! Anotar CLI
//!
//! Command-line interface for Anotar - a personal task list synced with a
//! remote task store.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use anotar_core::Config;

mod commands;
mod output;

use commands::task::NewTask;
use commands::Session;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "anotar")]
#[command(about = "Anotar - personal task list synced with a remote store")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log sync activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in (prints the hosted sign-in URL without arguments)
    Login {
        /// Session token to store
        #[arg(long, conflicts_with = "callback")]
        token: Option<String>,
        /// URL the hosted sign-in redirected to
        #[arg(long)]
        callback: Option<String>,
    },
    /// Sign out
    Logout,
    /// List all tasks
    #[command(alias = "ls")]
    List,
    /// Create a new task
    Add {
        /// Task name
        #[arg(short, long)]
        name: Option<String>,
        /// Task description
        #[arg(short, long)]
        description: Option<String>,
        /// Priority (low, medium, high, urgent)
        #[arg(short, long)]
        priority: Option<String>,
        /// Due date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        due: Option<String>,
        /// Count to reach for the task to be complete (default 10 when
        /// given without a value)
        #[arg(short, long, num_args = 0..=1)]
        goal: Option<Option<u64>>,
    },
    /// Set one field of a task
    Set {
        /// Task ID (full id or unique prefix)
        id: String,
        /// Field (name, description, priority, progress, goal, dueDate)
        field: String,
        /// New value
        value: String,
    },
    /// Toggle a task between complete and incomplete
    Done {
        /// Task ID (full id or unique prefix)
        id: String,
    },
    /// Delete a task
    #[command(alias = "rm")]
    Delete {
        /// Task ID (full id or unique prefix)
        id: String,
    },
    /// Show session and sync status
    Status,
    /// Keep syncing in the foreground, applying edits typed on stdin, until Ctrl-C
    Watch,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, api_endpoint, sync_interval_secs,
        /// auth_domain, client_id, redirect_uri)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands work on the config file itself
    let command = match cli.command {
        Commands::Config { command } => return handle_config_command(command, &output),
        command => command,
    };
    let config = Config::load()?;

    match command {
        Commands::Login { token, callback } => {
            commands::auth::login(&config, token, callback, &output)
        }
        Commands::Logout => commands::auth::logout(&config, &output),
        Commands::Status => commands::status::show(config, &output).await,
        command => handle_task_command(command, Session::open(config)?, output).await,
    }
}

async fn handle_task_command(command: Commands, session: Session, output: Output) -> Result<()> {
    match command {
        Commands::List => commands::task::list(&session, &output).await,
        Commands::Add {
            name,
            description,
            priority,
            due,
            goal,
        } => {
            let options = NewTask {
                name,
                description,
                priority,
                due,
                goal,
            };
            commands::task::add(&session, options, &output).await
        }
        Commands::Set { id, field, value } => {
            commands::task::set(&session, id, field, value, &output).await
        }
        Commands::Done { id } => commands::task::done(&session, id, &output).await,
        Commands::Delete { id } => commands::task::delete(&session, id, &output).await,
        Commands::Watch => commands::watch::watch(&session, Arc::new(output)).await,
        Commands::Login { .. } | Commands::Logout | Commands::Status | Commands::Config { .. } => {
            unreachable!("handled before opening a session")
        }
    }
}

fn handle_config_command(command: Option<ConfigCommands>, output: &Output) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(output),
        Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, output),
    }
}

/// Log to stderr; ANOTAR_LOG overrides the level picked by --verbose
fn init_logging(verbose: bool) {
    let log_level = std::env::var("ANOTAR_LOG")
        .unwrap_or_else(|_| if verbose { "debug" } else { "warn" }.to_string());
    let env_filter = EnvFilter::new(format!(
        "anotar_core={},anotar_cli={}",
        log_level, log_level
    ));

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
