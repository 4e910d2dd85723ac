//! Structured logging for HintForge.
//!
//! Console output plus daily rolling JSON files.

pub mod logger;

pub use logger::{init_from_config, init_logger, log_dir};
