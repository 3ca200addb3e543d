//! Configuration management CLI commands.

use clap::Subcommand;
use std::path::Path;
use unitflow::config::{config_file_path, format_size, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a commented config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Show,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, config_path: Option<&Path>) -> Result<(), CliError> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path);
    match command {
        ConfigCommands::Init { force } => run_init(&path, force),
        ConfigCommands::Show => run_show(&path),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::InvalidArgument(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    ConfigFile::default().save_to(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn run_show(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path)?;
    println!("# {}", path.display());
    println!("engine.max_workers = {}", config.engine.max_workers);
    println!("engine.unit_timeout = {}", config.engine.unit_timeout_secs);
    println!("retry.max_attempts = {}", config.retry.max_attempts);
    println!("retry.backoff_step_ms = {}", config.retry.backoff_step_ms);
    println!("batch.max_batch_size = {}", config.batch.max_batch_size);
    println!("batch.min_batch_size = {}", config.batch.min_batch_size);
    println!("memory.enabled = {}", config.memory.enabled);
    println!("memory.threshold = {}", format_size(config.memory.threshold_bytes));
    println!("memory.pause_ms = {}", config.memory.pause_ms);
    println!("source.chunk_size = {}", config.source.chunk_size);
    Ok(())
}
