//! Configuration loading.
//!
//! Settings come from an INI file (default `~/.unitflow/config.ini`) with
//! `[engine]`, `[retry]`, `[batch]`, `[memory]` and `[source]` sections.
//! Missing files and missing keys fall back to defaults.
//!
//! # Example
//!
//! ```
//! use unitflow::config::ConfigFile;
//!
//! let config = ConfigFile::default();
//! let engine_config = config.engine_config();
//! assert_eq!(engine_config.max_workers, 3);
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use defaults::{
    DEFAULT_CHUNK_SIZE, DEFAULT_MAX_WORKERS, DEFAULT_UNIT_TIMEOUT_SECS, MAX_WORKERS,
};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    BatchSettings, ConfigFile, EngineSettings, MemorySettings, RetrySettings, SourceSettings,
};
pub use size::{format_size, parse_size, SizeParseError};
