//! Wire form of pool state for durable storage.
//!
//! The storage layer only holds plain JSON values, so map-like containers are
//! written as an explicitly tagged list of pairs and rebuilt on load.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::label::Label;
use crate::types::{FrameId, TabId};

/// Tagged container encoding, e.g. `{"kind":"map","entries":[["a",0]]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireContainer<K, V> {
    Map { entries: Vec<(K, V)> },
}

impl<K, V> WireContainer<K, V>
where
    K: Clone + Ord + Hash,
    V: Clone,
{
    /// Encode a map. Entries are sorted by key so output is stable.
    pub fn from_map(map: &HashMap<K, V>) -> Self {
        let mut entries: Vec<(K, V)> = map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        WireContainer::Map { entries }
    }

    pub fn into_map(self) -> HashMap<K, V> {
        match self {
            WireContainer::Map { entries } => entries.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            WireContainer::Map { entries } => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A tab's pool as written to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedPool {
    pub free: Vec<Label>,
    pub assigned: WireContainer<Label, FrameId>,
}

/// Storage key of a tab's pool.
pub fn pool_key(tab_id: TabId) -> String {
    format!("pool:{tab_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_encoding_is_tagged() {
        let mut map = HashMap::new();
        map.insert(Label::new("b"), 2u32);
        map.insert(Label::new("a"), 0u32);

        let json = serde_json::to_value(WireContainer::from_map(&map)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "map", "entries": [["a", 0], ["b", 2]]})
        );
    }

    #[test]
    fn test_persisted_pool_decodes() {
        let raw = r#"{"free":["aa","a"],"assigned":{"kind":"map","entries":[["b",3]]}}"#;
        let pool: PersistedPool = serde_json::from_str(raw).unwrap();
        assert_eq!(pool.free.len(), 2);
        let assigned = pool.assigned.into_map();
        assert_eq!(assigned.get(&Label::new("b")), Some(&3));
    }

    #[test]
    fn test_untagged_map_is_rejected() {
        let raw = r#"{"free":[],"assigned":{"b":3}}"#;
        assert!(serde_json::from_str::<PersistedPool>(raw).is_err());
    }

    #[test]
    fn test_pool_key() {
        assert_eq!(pool_key(42), "pool:42");
    }
}
