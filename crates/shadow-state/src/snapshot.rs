//! Serializable point-in-time copies of the cache.
//!
//! A [`CacheSnapshot`] lists every entry ordered by `(kind, id)` together
//! with a BLAKE3 hash of that list. Two caches that converged to the same
//! state produce the same hash regardless of the order events arrived in,
//! which makes snapshots handy for diagnostics and for comparing runs.

use serde::{Deserialize, Serialize};

use crate::cache::EventCache;
use crate::entity::EventCacheEntry;
use crate::warmup::WarmupState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub warmup: WarmupState,
    pub entries: Vec<EventCacheEntry>,
    /// BLAKE3 hex digest of `entries` serialized as JSON.
    pub hash: String,
}

impl CacheSnapshot {
    /// Copy every entry under one read lock.
    pub fn capture(cache: &EventCache) -> Self {
        let mut entries: Vec<EventCacheEntry> = cache.with_store(|store| {
            store
                .kinds
                .values()
                .flat_map(|m| m.values())
                .map(|e| EventCacheEntry::clone(e))
                .collect()
        });
        entries.sort_by_key(|e| e.key);
        let hash = compute_hash(&entries);
        Self {
            warmup: cache.warmup_state(),
            entries,
            hash,
        }
    }

    /// `true` if `hash` matches the entries (the snapshot was not altered
    /// after capture or deserialization).
    pub fn verify(&self) -> bool {
        compute_hash(&self.entries) == self.hash
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn compute_hash(entries: &[EventCacheEntry]) -> String {
    // Serializing Vec/BTreeMap/plain structs to JSON cannot fail.
    let bytes = serde_json::to_vec(entries).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EventCacheConfig;
    use serde_json::{json, Value};
    use shadow_resources::constants::GameConstants;
    use std::sync::Arc;

    fn events() -> Vec<Value> {
        vec![
            json!({"type": "update", "kind": "npc", "key": 2, "revision": 1, "attributes": {"x": 1}}),
            json!({"type": "update", "kind": "skill", "key": 0, "revision": 1, "attributes": {"level": 99}}),
            json!({"type": "update", "kind": "npc", "key": 1, "revision": 2, "attributes": {"x": 5}}),
            json!({"type": "update", "kind": "npc", "key": 1, "revision": 1, "attributes": {"x": 4}}),
        ]
    }

    fn cache_from(events: &[Value]) -> EventCache {
        let cache = EventCache::new(EventCacheConfig::default(), Arc::new(GameConstants::default()));
        for e in events {
            cache.ingest(e);
        }
        cache
    }

    #[test]
    fn arrival_order_does_not_change_the_hash() {
        let forward = cache_from(&events()).capture_snapshot();
        let mut reversed = events();
        reversed.reverse();
        let backward = cache_from(&reversed).capture_snapshot();

        assert_eq!(forward.hash, backward.hash);
        assert_eq!(forward.len(), 3);
        assert_eq!(forward.entries[0].key.id, 1);
        assert!(forward.verify());
    }

    #[test]
    fn tampering_is_detected() {
        let snapshot = cache_from(&events()).capture_snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let mut back: CacheSnapshot = serde_json::from_str(&json).unwrap();
        assert!(back.verify());

        back.entries.pop();
        assert!(!back.verify());
    }
}
