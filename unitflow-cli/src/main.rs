//! Unitflow CLI - command-line interface
//!
//! Splits a document into units, pipes each one through an external command
//! in parallel, and writes the reassembled result.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use commands::config::ConfigCommands;
use commands::process::ProcessArgs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "unitflow")]
#[command(version = unitflow::VERSION)]
#[command(about = "Process documents unit by unit through an external command", long_about = None)]
struct Cli {
    /// Config file (default: ~/.unitflow/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a text or page-JSON document
    Process(ProcessArgs),

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Process(args) => commands::process::run(args, config_path).await,
        Commands::Config(command) => commands::config::run(command, config_path),
    };

    if let Err(e) = result {
        e.exit();
    }
}
