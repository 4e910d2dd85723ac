//! Config validation: schema checks with user-friendly error messages.

use hintforge_core::LabelUniverse;
use thiserror::Error;

use crate::schema::HintForgeConfig;

/// Log levels accepted by the logger without an explicit filter directive.
const KNOWN_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &HintForgeConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_labels(config, &mut report);
    validate_coordinator(config, &mut report);
    validate_client(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_labels(config: &HintForgeConfig, report: &mut ValidationReport) {
    let Some(alphabet) = config.labels.as_ref().and_then(|l| l.alphabet.as_deref()) else {
        return;
    };
    match LabelUniverse::from_alphabet(alphabet) {
        Ok(universe) if universe.len() < 10 => {
            report.warn(
                "labels.alphabet",
                format!("Only {} labels available; busy pages will run out", universe.len()),
            );
        }
        Ok(_) => {}
        Err(e) => report.error("labels.alphabet", e.to_string()),
    }
}

fn validate_coordinator(config: &HintForgeConfig, report: &mut ValidationReport) {
    let Some(coordinator) = &config.coordinator else { return };
    if coordinator.channel_buffer == Some(0) {
        report.error("coordinator.channelBuffer", "channelBuffer must be > 0");
    }
    if coordinator.event_buffer == Some(0) {
        report.error("coordinator.eventBuffer", "eventBuffer must be > 0");
    }
    if let (Some(debounce), Some(max_delay)) =
        (coordinator.persist_debounce_ms, coordinator.persist_max_delay_ms)
    {
        if debounce > max_delay {
            report.warn(
                "coordinator.persistDebounceMs",
                "persistDebounceMs exceeds persistMaxDelayMs; writes happen at the max delay",
            );
        }
    }
    if let Some(path) = &coordinator.database_path {
        if path.trim().is_empty() {
            report.error("coordinator.databasePath", "databasePath cannot be empty");
        }
    }
}

fn validate_client(config: &HintForgeConfig, report: &mut ValidationReport) {
    let Some(client) = &config.client else { return };
    if client.sync_interval_secs == Some(0) {
        report.error("client.syncIntervalSecs", "syncIntervalSecs must be > 0");
    }
    if client.return_batch_size == Some(0) {
        report.error("client.returnBatchSize", "returnBatchSize must be > 0");
    }
}

fn validate_logging(config: &HintForgeConfig, report: &mut ValidationReport) {
    let Some(level) = config.logging.as_ref().and_then(|l| l.level.as_deref()) else {
        return;
    };
    if !KNOWN_LEVELS.contains(&level.to_ascii_lowercase().as_str()) && !level.contains('=') {
        report.warn("logging.level", format!("Unknown log level '{level}'"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::apply_all_defaults;
    use crate::schema::{ClientConfig, LabelsConfig};

    #[test]
    fn defaulted_config_is_valid() {
        let report = validate(&apply_all_defaults(HintForgeConfig::default()));
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn duplicate_alphabet_is_error() {
        let cfg = HintForgeConfig {
            labels: Some(LabelsConfig {
                alphabet: Some("abca".into()),
            }),
            ..Default::default()
        };
        let report = validate(&cfg);
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].path, "labels.alphabet");
    }

    #[test]
    fn tiny_alphabet_is_warning() {
        let cfg = HintForgeConfig {
            labels: Some(LabelsConfig {
                alphabet: Some("ab".into()),
            }),
            ..Default::default()
        };
        let report = validate(&cfg);
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn zero_batch_size_is_error() {
        let cfg = HintForgeConfig {
            client: Some(ClientConfig {
                return_batch_size: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(!validate(&cfg).is_valid());
    }
}
