//! Typed runtime settings derived from a prepared [`HintForgeConfig`].

use std::time::Duration;

use hintforge_core::{HintError, LabelUniverse, DEFAULT_ALPHABET};

use crate::defaults::{
    DEFAULT_CHANNEL_BUFFER, DEFAULT_EVENT_BUFFER, DEFAULT_PERSIST_DEBOUNCE_MS,
    DEFAULT_PERSIST_MAX_DELAY_MS, DEFAULT_RETURN_BATCH_SIZE, DEFAULT_SYNC_INTERVAL_SECS,
};
use crate::schema::HintForgeConfig;

/// Settings for each tab's coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub channel_buffer: usize,
    pub event_buffer: usize,
    pub persist_debounce: Duration,
    pub persist_max_delay: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            channel_buffer: DEFAULT_CHANNEL_BUFFER,
            event_buffer: DEFAULT_EVENT_BUFFER,
            persist_debounce: Duration::from_millis(DEFAULT_PERSIST_DEBOUNCE_MS),
            persist_max_delay: Duration::from_millis(DEFAULT_PERSIST_MAX_DELAY_MS),
        }
    }
}

/// Settings for each frame client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub sync_interval: Duration,
    pub return_batch_size: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            return_batch_size: DEFAULT_RETURN_BATCH_SIZE,
        }
    }
}

impl HintForgeConfig {
    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        let defaults = CoordinatorSettings::default();
        let Some(c) = &self.coordinator else { return defaults };
        CoordinatorSettings {
            channel_buffer: c.channel_buffer.unwrap_or(defaults.channel_buffer).max(1),
            event_buffer: c.event_buffer.unwrap_or(defaults.event_buffer).max(1),
            persist_debounce: c
                .persist_debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.persist_debounce),
            persist_max_delay: c
                .persist_max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.persist_max_delay),
        }
    }

    pub fn client_settings(&self) -> ClientSettings {
        let defaults = ClientSettings::default();
        let Some(c) = &self.client else { return defaults };
        ClientSettings {
            sync_interval: c
                .sync_interval_secs
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sync_interval),
            return_batch_size: c
                .return_batch_size
                .unwrap_or(defaults.return_batch_size)
                .max(1),
        }
    }

    /// Build the label universe from the configured alphabet.
    pub fn label_universe(&self) -> Result<LabelUniverse, HintError> {
        let alphabet = self
            .labels
            .as_ref()
            .and_then(|l| l.alphabet.as_deref())
            .unwrap_or(DEFAULT_ALPHABET);
        LabelUniverse::from_alphabet(alphabet)
    }

    /// SQLite path for pool state, if one is configured.
    pub fn database_path(&self) -> Option<&str> {
        self.coordinator
            .as_ref()
            .and_then(|c| c.database_path.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ClientConfig, CoordinatorConfig, LabelsConfig};

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = HintForgeConfig::default();
        assert_eq!(cfg.coordinator_settings(), CoordinatorSettings::default());
        assert_eq!(cfg.client_settings(), ClientSettings::default());
        assert_eq!(cfg.label_universe().unwrap().len(), 702);
    }

    #[test]
    fn explicit_values_are_used() {
        let cfg = HintForgeConfig {
            labels: Some(LabelsConfig {
                alphabet: Some("ab".into()),
            }),
            coordinator: Some(CoordinatorConfig {
                persist_debounce_ms: Some(10),
                channel_buffer: Some(0),
                ..Default::default()
            }),
            client: Some(ClientConfig {
                sync_interval_secs: Some(1),
                return_batch_size: Some(2),
            }),
            ..Default::default()
        };
        let coordinator = cfg.coordinator_settings();
        assert_eq!(coordinator.persist_debounce, Duration::from_millis(10));
        assert_eq!(coordinator.channel_buffer, 1);
        let client = cfg.client_settings();
        assert_eq!(client.sync_interval, Duration::from_secs(1));
        assert_eq!(client.return_batch_size, 2);
        assert_eq!(cfg.label_universe().unwrap().len(), 6);
    }
}
