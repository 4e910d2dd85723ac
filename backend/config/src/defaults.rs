//! Config defaults: applies sensible default values to parsed config.

use hintforge_core::DEFAULT_ALPHABET;

use crate::schema::{ClientConfig, CoordinatorConfig, HintForgeConfig, LabelsConfig, LoggingConfig};

/// Default coordinator request queue depth.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Default pool event broadcast depth.
pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// Default quiet period before pool state is persisted.
pub const DEFAULT_PERSIST_DEBOUNCE_MS: u64 = 500;

/// Default cap on how long a dirty pool may stay unsaved.
pub const DEFAULT_PERSIST_MAX_DELAY_MS: u64 = 5_000;

/// Default period of frame synchronization.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 5;

/// Default number of queued returns that triggers a release.
pub const DEFAULT_RETURN_BATCH_SIZE: usize = 16;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: HintForgeConfig) -> HintForgeConfig {
    let config = apply_label_defaults(config);
    let config = apply_coordinator_defaults(config);
    let config = apply_client_defaults(config);
    apply_logging_defaults(config)
}

fn apply_label_defaults(mut config: HintForgeConfig) -> HintForgeConfig {
    let labels = config.labels.get_or_insert_with(LabelsConfig::default);
    if labels.alphabet.is_none() {
        labels.alphabet = Some(DEFAULT_ALPHABET.to_string());
    }
    config
}

fn apply_coordinator_defaults(mut config: HintForgeConfig) -> HintForgeConfig {
    let coordinator = config.coordinator.get_or_insert_with(CoordinatorConfig::default);
    coordinator.channel_buffer.get_or_insert(DEFAULT_CHANNEL_BUFFER);
    coordinator.event_buffer.get_or_insert(DEFAULT_EVENT_BUFFER);
    coordinator
        .persist_debounce_ms
        .get_or_insert(DEFAULT_PERSIST_DEBOUNCE_MS);
    coordinator
        .persist_max_delay_ms
        .get_or_insert(DEFAULT_PERSIST_MAX_DELAY_MS);
    config
}

fn apply_client_defaults(mut config: HintForgeConfig) -> HintForgeConfig {
    let client = config.client.get_or_insert_with(ClientConfig::default);
    client.sync_interval_secs.get_or_insert(DEFAULT_SYNC_INTERVAL_SECS);
    client.return_batch_size.get_or_insert(DEFAULT_RETURN_BATCH_SIZE);
    config
}

fn apply_logging_defaults(mut config: HintForgeConfig) -> HintForgeConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    if logging.level.is_none() {
        logging.level = Some(DEFAULT_LOG_LEVEL.to_string());
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_default_alphabet() {
        let cfg = apply_all_defaults(HintForgeConfig::default());
        assert_eq!(
            cfg.labels.unwrap().alphabet.unwrap(),
            DEFAULT_ALPHABET
        );
    }

    #[test]
    fn applies_persist_timing() {
        let cfg = apply_all_defaults(HintForgeConfig::default());
        let coordinator = cfg.coordinator.unwrap();
        assert_eq!(coordinator.persist_debounce_ms, Some(DEFAULT_PERSIST_DEBOUNCE_MS));
        assert_eq!(coordinator.persist_max_delay_ms, Some(DEFAULT_PERSIST_MAX_DELAY_MS));
        assert!(coordinator.database_path.is_none());
    }

    #[test]
    fn does_not_override_user_batch_size() {
        let cfg = HintForgeConfig {
            client: Some(ClientConfig {
                return_batch_size: Some(3),
                ..Default::default()
            }),
            ..Default::default()
        };
        let cfg = apply_all_defaults(cfg);
        let client = cfg.client.unwrap();
        assert_eq!(client.return_batch_size, Some(3));
        assert_eq!(client.sync_interval_secs, Some(DEFAULT_SYNC_INTERVAL_SECS));
    }
}
