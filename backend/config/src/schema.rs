//! HintForge configuration schema.
//!
//! Every section is optional in the YAML file; missing values are filled by
//! [`crate::defaults::apply_all_defaults`].

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for HintForge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HintForgeConfig {
    /// Label universe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<LabelsConfig>,

    /// Per-tab coordinator behaviour and persistence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<CoordinatorConfig>,

    /// Frame client caching and synchronization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientConfig>,

    /// Logging configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelsConfig {
    /// Characters labels are built from. Singles first, then pairs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alphabet: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_buffer: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_buffer: Option<usize>,
    /// Quiet period after the last mutation before the pool is written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persist_debounce_ms: Option<u64>,
    /// Upper bound between the first unsaved mutation and the write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persist_max_delay_ms: Option<u64>,
    /// SQLite file for pool state; in-memory storage when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_interval_secs: Option<u64>,
    /// Pending returns are released once this many have queued up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_batch_size: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_camel_case_yaml() {
        let yaml = r#"
labels:
  alphabet: "asdf"
coordinator:
  persistDebounceMs: 250
  databasePath: /tmp/pools.db
client:
  returnBatchSize: 4
"#;
        let cfg: HintForgeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.labels.unwrap().alphabet.as_deref(), Some("asdf"));
        let coordinator = cfg.coordinator.unwrap();
        assert_eq!(coordinator.persist_debounce_ms, Some(250));
        assert_eq!(coordinator.database_path.as_deref(), Some("/tmp/pools.db"));
        assert_eq!(cfg.client.unwrap().return_batch_size, Some(4));
        assert!(cfg.logging.is_none());
    }

    #[test]
    fn test_empty_sections_are_skipped() {
        let yaml = serde_yaml::to_string(&HintForgeConfig::default()).unwrap();
        assert_eq!(yaml.trim(), "{}");
    }
}
