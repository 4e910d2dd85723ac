//! Locating, reading and writing the YAML config file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{debug, info};

use crate::schema::HintForgeConfig;

const CONFIG_FILE_NAME: &str = "config.yaml";
const CONFIG_DIR_ENV: &str = "HINTFORGE_CONFIG_DIR";

/// `$HINTFORGE_CONFIG_DIR`, else `~/.hintforge`, else `./.hintforge`.
pub fn config_dir() -> PathBuf {
    std::env::var_os(CONFIG_DIR_ENV)
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".hintforge")))
        .unwrap_or_else(|| PathBuf::from(".hintforge"))
}

pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Read the config at `path`. A missing file is not an error: every
/// section is optional, so it reads as an empty config.
pub async fn load_config(path: &Path) -> Result<HintForgeConfig> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(HintForgeConfig::default());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    let config = parse_config(&raw).with_context(|| format!("Invalid config at {}", path.display()))?;
    info!(path = %path.display(), "Config loaded");
    Ok(config)
}

/// Replace the config at `path`. The file is written next to its target and
/// renamed over it, so readers never see a partial file.
pub async fn write_config(config: &HintForgeConfig, path: &Path) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let staged = path.with_extension(format!("yaml.{}.tmp", std::process::id()));
    fs::write(&staged, render_config(config)?)
        .await
        .with_context(|| format!("Failed to write {}", staged.display()))?;
    if let Err(e) = fs::rename(&staged, path).await {
        let _ = fs::remove_file(&staged).await;
        return Err(e).with_context(|| format!("Failed to replace {}", path.display()));
    }

    info!(path = %path.display(), "Config written");
    Ok(())
}

fn parse_config(raw: &str) -> Result<HintForgeConfig> {
    if raw.trim().is_empty() {
        return Ok(HintForgeConfig::default());
    }
    Ok(serde_yaml::from_str(raw)?)
}

fn render_config(config: &HintForgeConfig) -> Result<String> {
    serde_yaml::to_string(config).context("Failed to serialize config")
}
