//! Namespace identifiers and the handles the registry hands out.
//!
//! A handle is a thin view over the shared event cache. It holds no state
//! of its own beyond lazily built children (tab views, helpers) that callers
//! attach to it.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use shadow_resources::constants::GameConstants;
use shadow_resources::keyed::KeyedLocks;
use shadow_state::cache::EventCache;
use shadow_state::entity::{EntityKey, EventCacheEntry};
use shadow_state::query::QueryRef;
use shadow_state::schema::EntityKind;

use crate::RuntimeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceId {
    Tabs,
    World,
    Navigation,
    Interfaces,
    Input,
    Interactions,
}

impl NamespaceId {
    pub const ALL: [NamespaceId; 6] = [
        Self::Tabs,
        Self::World,
        Self::Navigation,
        Self::Interfaces,
        Self::Input,
        Self::Interactions,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tabs => "tabs",
            Self::World => "world",
            Self::Navigation => "navigation",
            Self::Interfaces => "interfaces",
            Self::Input => "input",
            Self::Interactions => "interactions",
        }
    }

    /// Entity kinds this namespace reads from the cache. Handles refuse
    /// queries over any other kind.
    pub fn entity_kinds(self) -> &'static [EntityKind] {
        match self {
            Self::Tabs => &[
                EntityKind::InventoryItem,
                EntityKind::EquipmentItem,
                EntityKind::Skill,
                EntityKind::Varp,
            ],
            Self::World => &[EntityKind::Npc, EntityKind::GameObject, EntityKind::GroundItem],
            Self::Navigation => &[EntityKind::Varp],
            Self::Interfaces => &[EntityKind::BankItem, EntityKind::Varp],
            Self::Input => &[],
            Self::Interactions => &[
                EntityKind::Npc,
                EntityKind::GameObject,
                EntityKind::GroundItem,
                EntityKind::InventoryItem,
            ],
        }
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NamespaceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|id| id.as_str()).collect();
                format!("unknown namespace '{s}'. Known namespaces: [{}]", known.join(", "))
            })
    }
}

type Child = Arc<dyn Any + Send + Sync>;

/// Shared handle for one namespace.
pub struct NamespaceHandle {
    id: NamespaceId,
    cache: Arc<EventCache>,
    children: RwLock<HashMap<String, Child>>,
    child_locks: KeyedLocks<String>,
}

impl fmt::Debug for NamespaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceHandle")
            .field("id", &self.id)
            .field("children", &self.children.read().len())
            .finish_non_exhaustive()
    }
}

impl NamespaceHandle {
    pub(crate) fn new(id: NamespaceId, cache: Arc<EventCache>) -> Self {
        Self {
            id,
            cache,
            children: RwLock::new(HashMap::new()),
            child_locks: KeyedLocks::new(),
        }
    }

    pub fn id(&self) -> NamespaceId {
        self.id
    }

    pub fn cache(&self) -> &Arc<EventCache> {
        &self.cache
    }

    pub fn constants(&self) -> &Arc<GameConstants> {
        self.cache.constants()
    }

    /// `true` if `kind` is one of this namespace's entity kinds.
    pub fn reads(&self, kind: EntityKind) -> bool {
        self.id.entity_kinds().contains(&kind)
    }

    /// Start a query over `kind`.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::KindOutsideNamespace`] if this namespace does not
    /// read `kind`.
    pub fn query(&self, kind: EntityKind) -> Result<QueryRef<'_>, RuntimeError> {
        if !self.reads(kind) {
            return Err(RuntimeError::KindOutsideNamespace {
                namespace: self.id,
                kind,
            });
        }
        Ok(self.cache.query(kind))
    }

    pub fn get(&self, key: &EntityKey) -> Option<Arc<EventCacheEntry>> {
        self.cache.get(key)
    }

    /// `true` once the underlying cache is warm. Never blocks.
    pub fn is_ready(&self) -> bool {
        self.cache.is_warm()
    }

    /// The child registered under `name`, built with `init` on first use.
    ///
    /// Concurrent first requests for one name build it once. `init` may
    /// request other children of this handle but not `name` itself.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::ChildTypeMismatch`] if `name` already holds a value
    /// of a different type.
    pub fn child<T>(&self, name: &str, init: impl FnOnce(&Self) -> T) -> Result<Arc<T>, RuntimeError>
    where
        T: Any + Send + Sync,
    {
        if let Some(existing) = self.children.read().get(name) {
            return self.downcast(name, Arc::clone(existing));
        }

        let slot = self.child_locks.slot(&name.to_owned());
        let _guard = slot.lock();
        if let Some(existing) = self.children.read().get(name) {
            return self.downcast(name, Arc::clone(existing));
        }

        let built: Arc<T> = Arc::new(init(self));
        self.children
            .write()
            .insert(name.to_owned(), Arc::clone(&built) as Child);
        tracing::debug!(namespace = %self.id, child = name, "namespace child built");
        Ok(built)
    }

    pub fn child_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.children.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    fn downcast<T: Any + Send + Sync>(&self, name: &str, child: Child) -> Result<Arc<T>, RuntimeError> {
        child.downcast::<T>().map_err(|_| RuntimeError::ChildTypeMismatch {
            namespace: self.id,
            child: name.to_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shadow_state::cache::EventCacheConfig;
    use shadow_state::consumer::IterSource;
    use shadow_state::warmup::WarmupOutcome;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn handle(id: NamespaceId) -> NamespaceHandle {
        let cache = Arc::new(EventCache::new(
            EventCacheConfig::default(),
            Arc::new(GameConstants::default()),
        ));
        NamespaceHandle::new(id, cache)
    }

    // -- 1. ids ---------------------------------------------------------------

    #[test]
    fn ids_round_trip_through_names() {
        for id in NamespaceId::ALL {
            assert_eq!(id.as_str().parse::<NamespaceId>(), Ok(id));
        }
        let err = "bank".parse::<NamespaceId>().unwrap_err();
        assert!(err.contains("tabs"));
    }

    // -- 2. cache views -------------------------------------------------------

    #[test]
    fn handle_reads_through_to_cache() {
        let ns = handle(NamespaceId::World);
        assert!(!ns.is_ready());

        let consumer = ns
            .cache()
            .subscribe(IterSource::new(vec![
                json!({"type": "update", "kind": "npc", "key": 4, "revision": 1, "attributes": {"x": 10}}),
                json!({"type": "snapshot_complete"}),
            ]))
            .unwrap();
        consumer.join().unwrap();

        assert!(ns.is_ready());
        assert_eq!(ns.query(EntityKind::Npc).unwrap().count(), 1);
        let key = EntityKey::new(EntityKind::Npc, 4);
        assert_eq!(ns.get(&key).and_then(|e| e.int("x")), Some(10));
        assert_eq!(ns.cache().await_warm(Duration::ZERO), WarmupOutcome::Warm);
    }

    #[test]
    fn queries_are_limited_to_the_namespace_kinds() {
        let tabs = handle(NamespaceId::Tabs);
        assert!(tabs.reads(EntityKind::Skill));
        assert!(tabs.query(EntityKind::InventoryItem).is_ok());
        match tabs.query(EntityKind::Npc) {
            Err(RuntimeError::KindOutsideNamespace { namespace, kind }) => {
                assert_eq!(namespace, NamespaceId::Tabs);
                assert_eq!(kind, EntityKind::Npc);
            }
            other => panic!("expected rejection, got {:?}", other.map(|q| q.count())),
        }

        let input = handle(NamespaceId::Input);
        assert!(EntityKind::ALL.iter().all(|kind| input.query(*kind).is_err()));
    }

    // -- 3. children ----------------------------------------------------------

    #[test]
    fn children_are_built_once() {
        let ns = Arc::new(handle(NamespaceId::Tabs));
        let builds = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let ns = Arc::clone(&ns);
                let builds = Arc::clone(&builds);
                std::thread::spawn(move || {
                    ns.child("inventory", |_| {
                        builds.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(10));
                        vec![EntityKind::InventoryItem]
                    })
                    .unwrap()
                })
            })
            .collect();
        let children: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(children.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(ns.child_names(), vec!["inventory".to_owned()]);
    }

    #[test]
    fn child_type_mismatch_is_reported() {
        let ns = handle(NamespaceId::Tabs);
        ns.child("skills", |_| 23_u32).unwrap();
        match ns.child("skills", |_| "oops".to_owned()) {
            Err(RuntimeError::ChildTypeMismatch { namespace, child }) => {
                assert_eq!(namespace, NamespaceId::Tabs);
                assert_eq!(child, "skills");
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn child_init_may_build_siblings() {
        let ns = handle(NamespaceId::Interfaces);
        let outer = ns
            .child("bank", |ns| {
                let inner = ns.child("bank_items", |_| 7_i64).unwrap();
                *inner + 1
            })
            .unwrap();
        assert_eq!(*outer, 8);
        assert_eq!(ns.child_names().len(), 2);
    }
}
