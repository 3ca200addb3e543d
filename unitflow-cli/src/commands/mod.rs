//! CLI command implementations.
//!
//! - [`process`] - run a document through an external command
//! - [`config`] - configuration management (init, show, path)

pub mod config;
pub mod process;
