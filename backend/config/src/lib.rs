//! `hintforge-config`: HintForge runtime configuration management.
//!
//! Provides:
//! - Typed config schema (labels, coordinator, client, logging)
//! - YAML read/write with atomic backup rotation
//! - Default value application
//! - Validation with errors and warnings
//! - Typed runtime settings for the coordinator and frame clients

pub mod defaults;
pub mod io;
pub mod schema;
pub mod settings;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use io::{config_dir, config_file_path, load_config, write_config};
pub use schema::HintForgeConfig;
pub use settings::{ClientSettings, CoordinatorSettings};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Result};
use std::path::Path;

/// Load, apply defaults and validate a config file.
///
/// This is the main entry point for loading a config at runtime.
pub async fn load_and_prepare(path: &Path) -> Result<HintForgeConfig> {
    let config = apply_all_defaults(load_config(path).await?);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if let Some(first) = report.errors.into_iter().next() {
        bail!(first);
    }

    Ok(config)
}
