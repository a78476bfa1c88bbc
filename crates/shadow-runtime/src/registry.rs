//! One shared handle per namespace.
//!
//! The first [`get`](NamespaceRegistry::get) for an id constructs its handle
//! under a per-id lock; every later call, from any thread, returns the same
//! [`Arc`]. Construction only wires the handle to the cache. It never waits
//! for warmup, so asking for a namespace during startup is always cheap.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use shadow_resources::keyed::KeyedLocks;
use shadow_state::cache::EventCache;

use crate::namespace::{NamespaceHandle, NamespaceId};

pub struct NamespaceRegistry {
    cache: Arc<EventCache>,
    handles: RwLock<HashMap<NamespaceId, Arc<NamespaceHandle>>>,
    init_locks: KeyedLocks<NamespaceId>,
    constructed: AtomicUsize,
}

impl std::fmt::Debug for NamespaceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceRegistry")
            .field("constructed", &self.constructed_ids())
            .finish_non_exhaustive()
    }
}

impl NamespaceRegistry {
    pub fn new(cache: Arc<EventCache>) -> Self {
        Self {
            cache,
            handles: RwLock::new(HashMap::new()),
            init_locks: KeyedLocks::new(),
            constructed: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, id: NamespaceId) -> Arc<NamespaceHandle> {
        if let Some(handle) = self.handles.read().get(&id) {
            return Arc::clone(handle);
        }

        let slot = self.init_locks.slot(&id);
        let _guard = slot.lock();
        if let Some(handle) = self.handles.read().get(&id) {
            return Arc::clone(handle);
        }

        let handle = Arc::new(NamespaceHandle::new(id, Arc::clone(&self.cache)));
        self.handles.write().insert(id, Arc::clone(&handle));
        self.constructed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(namespace = %id, warm = self.cache.is_warm(), "namespace constructed");
        handle
    }

    pub fn is_constructed(&self, id: NamespaceId) -> bool {
        self.handles.read().contains_key(&id)
    }

    /// Total handles constructed over the registry's life. Equals the
    /// number of distinct ids requested.
    pub fn constructed_count(&self) -> usize {
        self.constructed.load(Ordering::Relaxed)
    }

    pub fn constructed_ids(&self) -> Vec<NamespaceId> {
        let mut ids: Vec<_> = self.handles.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
