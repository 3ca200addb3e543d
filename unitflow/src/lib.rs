//! Unitflow - cancellable, memory-aware parallel processing of document units
//!
//! A job is an ordered list of [`Unit`](job::Unit)s (text chunks or pages).
//! The engine runs each unit through a [`Provider`](processor::Provider) on a
//! bounded per-job worker pool, retrying transient failures and falling back
//! to the original content when a unit cannot be processed. Results are
//! reassembled in unit order.
//!
//! # High-Level API
//!
//! ```ignore
//! use std::sync::Arc;
//! use unitflow::config::ConfigFile;
//! use unitflow::engine::UnitEngine;
//! use unitflow::processor::CommandProvider;
//!
//! let config = ConfigFile::load()?.engine_config();
//! let provider = CommandProvider::from_command_line("my-translator --to en").unwrap();
//! let engine = UnitEngine::new(config, Arc::new(provider));
//!
//! let result = engine.process_text(&text).await?;
//! println!("{}", result.merged("\n\n"));
//! ```
//!
//! # Modules
//!
//! - [`engine`] - job submission, handles and the batch driver
//! - [`registry`] - active and cancelled jobs
//! - [`pool`] - bounded per-job worker pools
//! - [`batch`] - batch sizing and memory-pressure throttling
//! - [`processor`] - the provider seam and retry handling
//! - [`assembler`] - ordered result assembly
//! - [`source`] - text and page-JSON documents

pub mod assembler;
pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod job;
pub mod logging;
pub mod pool;
pub mod processor;
pub mod registry;
pub mod source;

/// Version of the unitflow library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
