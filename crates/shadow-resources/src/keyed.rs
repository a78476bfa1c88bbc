//! Per-key mutual exclusion inside one process.
//!
//! [`KeyedLocks`] hands out one mutex per key so that work on different keys
//! proceeds in parallel while work on the same key is serialized. Used by the
//! fetcher (one download per local path), the generator (one generation per
//! artifact id) and the loader (one first-load per artifact id).

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

/// A table of lazily created per-key mutexes.
///
/// Entries are never removed; the key space (resources, artifacts,
/// namespaces) is small and fixed for the life of a process.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex for `key`, created on first use.
    ///
    /// The table lock is released before the caller locks the returned
    /// mutex, so holding one key never blocks lookups of another.
    pub fn slot(&self, key: &K) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock();
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Number of keys that have been locked at least once.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
