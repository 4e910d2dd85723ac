//! Structured Logger
//!
//! Wraps `tracing` to provide JSON-formatted output, file rotation (NDJSON),
//! and environment-based level control.

use std::path::{Path, PathBuf};

use hintforge_config::defaults::DEFAULT_LOG_LEVEL;
use hintforge_config::{config_dir, HintForgeConfig};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "hintforge.log";

/// Initialize the global structured logger.
/// Creates a console logger and a rolling file logger.
pub fn init_logger<P: AsRef<Path>>(log_dir: P, level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    // Rolling file appender: writes NDJSON to `<dir>/hintforge.log.YYYY-MM-DD`
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);

    let file_layer = fmt::layer()
        .json()
        .with_writer(file_appender)
        .with_ansi(false);

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_ansi(true);

    // A second call is a no-op; the first subscriber stays installed.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

/// Directory log files go to: `logging.dir`, else `<config dir>/logs`.
pub fn log_dir(config: &HintForgeConfig) -> PathBuf {
    config
        .logging
        .as_ref()
        .and_then(|l| l.dir.as_deref())
        .map(PathBuf::from)
        .unwrap_or_else(|| config_dir().join("logs"))
}

/// Initialize the logger from the `logging` config section.
pub fn init_from_config(config: &HintForgeConfig) {
    let level = config
        .logging
        .as_ref()
        .and_then(|l| l.level.as_deref())
        .unwrap_or(DEFAULT_LOG_LEVEL);
    init_logger(log_dir(config), level);
}

#[cfg(test)]
mod tests {
    use super::*;
    use hintforge_config::schema::LoggingConfig;

    #[test]
    fn test_log_dir_prefers_configured_dir() {
        let config = HintForgeConfig {
            logging: Some(LoggingConfig {
                level: None,
                dir: Some("/var/log/hintforge".into()),
            }),
            ..Default::default()
        };
        assert_eq!(log_dir(&config), PathBuf::from("/var/log/hintforge"));
    }

    #[test]
    fn test_log_dir_falls_back_to_config_dir() {
        let dir = log_dir(&HintForgeConfig::default());
        assert!(dir.ends_with("logs"));
    }

    #[test]
    fn test_init_writes_rolling_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config = HintForgeConfig {
            logging: Some(LoggingConfig {
                level: Some("debug".into()),
                dir: Some(tmp.path().to_string_lossy().into_owned()),
            }),
            ..Default::default()
        };
        init_from_config(&config);
        init_from_config(&config);
        tracing::info!(tab_id = 1, "Logger ready");

        let written = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(Result::ok)
            .any(|e| e.file_name().to_string_lossy().starts_with(LOG_FILE_PREFIX));
        assert!(written);
    }
}
