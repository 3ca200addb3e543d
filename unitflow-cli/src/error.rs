//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;
use unitflow::config::ConfigFileError;
use unitflow::error::EngineError;
use unitflow::source::SourceError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(std::io::Error),
    /// Configuration file could not be loaded or saved
    Config(ConfigFileError),
    /// Invalid command-line arguments
    InvalidArgument(String),
    /// Failed to read the input document
    FileRead { path: PathBuf, error: std::io::Error },
    /// Input document could not be split into units
    Source(SourceError),
    /// Job submission or processing failed
    Engine(EngineError),
    /// Failed to write the output document
    FileWrite { path: PathBuf, error: std::io::Error },
    /// Some units kept their original content and `--strict` was given
    Degraded { degraded: usize, total: usize },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Config(ConfigFileError::InvalidValue { .. }) => {
                eprintln!();
                eprintln!("Fix the value in the config file, or regenerate it with:");
                eprintln!("  unitflow config init --force");
            }
            CliError::Degraded { .. } => {
                eprintln!();
                eprintln!("The output was still written; degraded units hold their original text.");
                eprintln!("Check the log file for the provider errors.");
                process::exit(2)
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::InvalidArgument(msg) => write!(f, "{}", msg),
            CliError::FileRead { path, error } => {
                write!(f, "Failed to read file '{}': {}", path.display(), error)
            }
            CliError::Source(e) => write!(f, "Failed to parse input: {}", e),
            CliError::Engine(e) => write!(f, "Processing failed: {}", e),
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path.display(), error)
            }
            CliError::Degraded { degraded, total } => write!(
                f,
                "{} of {} units could not be processed",
                degraded, total
            ),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) => Some(e),
            CliError::Config(e) => Some(e),
            CliError::FileRead { error, .. } => Some(error),
            CliError::Source(e) => Some(e),
            CliError::Engine(e) => Some(e),
            CliError::FileWrite { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        CliError::Engine(e)
    }
}

impl From<SourceError> for CliError {
    fn from(e: SourceError) -> Self {
        CliError::Source(e)
    }
}
