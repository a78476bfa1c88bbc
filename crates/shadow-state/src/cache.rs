//! The event cache.
//!
//! [`EventCache`] holds the latest known state of every entity, fed by one
//! background consumer thread and read concurrently from any number of
//! threads.
//!
//! # Consistency
//!
//! - Entries are replaced whole: each update builds a new
//!   [`EventCacheEntry`] and swaps the `Arc` in under the store's write lock.
//! - Every update and removal carries a revision stamp. An event whose stamp
//!   is not newer than the entity's current stamp (including the stamp of a
//!   removal) is discarded, so out-of-order delivery never regresses state.
//! - Queries evaluate inside a single read-lock scope, so one terminal call
//!   never mixes pre- and post-update data.
//! - Malformed events are logged, counted and dropped; they never stop the
//!   consumer.
//! - Removal stamps are kept for at most `tombstone_capacity` keys. Past
//!   that the oldest removal is forgotten, and only an update older than
//!   that forgotten removal could bring its key back.
//!
//! # Warmup
//!
//! The cache is `Cold` until [`subscribe`](EventCache::subscribe) starts the
//! consumer (`Warming`) and `Warm` only after the source sends
//! `snapshot_complete`. Reads never block on warmup;
//! [`await_warm`](EventCache::await_warm) is the only blocking call.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shadow_resources::artifact::BitAccessor;
use shadow_resources::constants::GameConstants;

use crate::consumer::{ConsumerHandle, EventSource};
use crate::entity::{EntityKey, EventCacheEntry};
use crate::event::{self, CacheEvent, DecodeError, UpdateMode};
use crate::history::{EventHistory, RecordedEvent, DEFAULT_HISTORY_CAPACITY};
use crate::query::QueryRef;
use crate::schema::EntityKind;
use crate::snapshot::CacheSnapshot;
use crate::warmup::{WarmupGate, WarmupOutcome, WarmupState};
use crate::StateError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for an [`EventCache`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCacheConfig {
    /// Channel events retained per channel. Default: 100.
    pub history_capacity: usize,

    /// Name given to the consumer thread. Default: `"shadow-event-consumer"`.
    pub consumer_thread_name: String,

    /// Removal stamps retained before the oldest is evicted. Default: 4096.
    pub tombstone_capacity: usize,
}

/// Default number of removal stamps retained.
pub const DEFAULT_TOMBSTONE_CAPACITY: usize = 4096;

impl Default for EventCacheConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            consumer_thread_name: "shadow-event-consumer".to_owned(),
            tombstone_capacity: DEFAULT_TOMBSTONE_CAPACITY,
        }
    }
}

/// Counters describing what the consumer has done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Updates and removals that changed the store.
    pub applied: u64,
    /// Updates and removals discarded for carrying an old revision.
    pub stale: u64,
    /// Events that failed to decode.
    pub malformed: u64,
    /// Channel events recorded in history.
    pub channel_events: u64,
    /// Entries currently in the store.
    pub entries: usize,
    /// Removal stamps currently retained.
    pub tombstones: usize,
}

/// What happened to one ingested event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Ingested {
    Applied,
    Stale,
    Recorded,
    Warm,
    Malformed(DecodeError),
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct Store {
    /// Entries grouped by kind, ordered by id.
    pub(crate) kinds: HashMap<EntityKind, BTreeMap<i64, Arc<EventCacheEntry>>>,
    tombstones: Tombstones,
    last_update: Option<Instant>,
}

impl Store {
    fn current_revision(&self, key: &EntityKey) -> Option<u64> {
        let live = self
            .kinds
            .get(&key.kind)
            .and_then(|m| m.get(&key.id))
            .map(|e| e.revision);
        live.or_else(|| self.tombstones.revision(key))
    }

    fn entry(&self, key: &EntityKey) -> Option<&Arc<EventCacheEntry>> {
        self.kinds.get(&key.kind).and_then(|m| m.get(&key.id))
    }

    pub(crate) fn len(&self) -> usize {
        self.kinds.values().map(BTreeMap::len).sum()
    }
}

/// Revision of the removal that deleted a key, so older updates cannot
/// resurrect it. Bounded; the oldest removal is evicted first.
#[derive(Default)]
struct Tombstones {
    stamps: HashMap<EntityKey, (u64, u64)>,
    order: VecDeque<(EntityKey, u64)>,
    next_seq: u64,
}

impl Tombstones {
    fn revision(&self, key: &EntityKey) -> Option<u64> {
        self.stamps.get(key).map(|(revision, _)| *revision)
    }

    fn insert(&mut self, key: EntityKey, revision: u64, capacity: usize) {
        if capacity == 0 {
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.stamps.insert(key, (revision, seq));
        self.order.push_back((key, seq));
        while self.stamps.len() > capacity {
            let Some((oldest, seq)) = self.order.pop_front() else {
                break;
            };
            // Skip queue slots superseded by a later removal or a re-insert.
            if self.stamps.get(&oldest).is_some_and(|(_, s)| *s == seq) {
                self.stamps.remove(&oldest);
            }
        }
        if self.order.len() > capacity.saturating_mul(2) {
            let stamps = &self.stamps;
            self.order
                .retain(|(key, seq)| stamps.get(key).is_some_and(|(_, s)| s == seq));
        }
    }

    fn remove(&mut self, key: &EntityKey) {
        self.stamps.remove(key);
    }

    fn len(&self) -> usize {
        self.stamps.len()
    }

    fn clear(&mut self) {
        self.stamps.clear();
        self.order.clear();
    }
}

// ---------------------------------------------------------------------------
// EventCache
// ---------------------------------------------------------------------------

pub struct EventCache {
    config: EventCacheConfig,
    constants: Arc<GameConstants>,
    store: RwLock<Store>,
    history: Mutex<EventHistory>,
    warmup: WarmupGate,
    subscribed: AtomicBool,
    applied: AtomicU64,
    stale: AtomicU64,
    malformed: AtomicU64,
}

impl fmt::Debug for EventCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCache")
            .field("warmup", &self.warmup.state())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl EventCache {
    /// Create a cold cache. `constants` must already be loaded; the event
    /// path never loads artifacts.
    pub fn new(config: EventCacheConfig, constants: Arc<GameConstants>) -> Self {
        let history = EventHistory::new(config.history_capacity);
        Self {
            config,
            constants,
            store: RwLock::new(Store::default()),
            history: Mutex::new(history),
            warmup: WarmupGate::new(),
            subscribed: AtomicBool::new(false),
            applied: AtomicU64::new(0),
            stale: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &EventCacheConfig {
        &self.config
    }

    pub fn constants(&self) -> &Arc<GameConstants> {
        &self.constants
    }

    // -- subscription ---------------------------------------------------------

    /// Start the background consumer reading from `source`.
    ///
    /// Moves the cache from `Cold` to `Warming`. Only one subscription is
    /// allowed per cache.
    ///
    /// # Errors
    ///
    /// - [`StateError::AlreadySubscribed`] on a second call.
    /// - [`StateError::ConsumerSpawn`] if the thread cannot be started.
    pub fn subscribe(self: &Arc<Self>, source: impl EventSource) -> Result<ConsumerHandle, StateError> {
        if self.subscribed.swap(true, Ordering::SeqCst) {
            return Err(StateError::AlreadySubscribed);
        }

        // Warming must be visible before the consumer can see snapshot_complete.
        self.warmup.advance(WarmupState::Warming);

        let cache = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name(self.config.consumer_thread_name.clone())
            .spawn(move || cache.consume(source));
        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                self.warmup.reset_warming();
                self.subscribed.store(false, Ordering::SeqCst);
                return Err(StateError::ConsumerSpawn(e));
            }
        };

        tracing::info!(thread = %self.config.consumer_thread_name, "event consumer started");
        Ok(ConsumerHandle::new(thread))
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }

    fn consume(&self, mut source: impl EventSource) -> u64 {
        let mut consumed = 0;
        while let Some(raw) = source.next_event() {
            consumed += 1;
            self.ingest(&raw);
        }
        tracing::info!(events = consumed, "event source closed");
        consumed
    }

    /// Decode and apply one raw event.
    pub(crate) fn ingest(&self, raw: &Value) -> Ingested {
        match event::decode(raw, &self.constants) {
            Ok(event) => self.apply(event),
            Err(err) => {
                self.malformed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %err, event = %raw, "discarding malformed event");
                Ingested::Malformed(err)
            }
        }
    }

    fn apply(&self, event: CacheEvent) -> Ingested {
        match event {
            CacheEvent::Update {
                key,
                revision,
                mode,
                attributes,
                cleared,
            } => {
                let mut store = self.store.write();
                if store.current_revision(&key).is_some_and(|cur| revision <= cur) {
                    drop(store);
                    return self.discard_stale(&key, revision);
                }
                let mut merged = match (mode, store.entry(&key)) {
                    (UpdateMode::Partial, Some(existing)) => existing.attributes.clone(),
                    _ => Default::default(),
                };
                merged.extend(attributes);
                for name in &cleared {
                    merged.remove(name);
                }
                let entry = Arc::new(EventCacheEntry {
                    key,
                    revision,
                    attributes: merged,
                });
                store.tombstones.remove(&key);
                store.kinds.entry(key.kind).or_default().insert(key.id, entry);
                store.last_update = Some(Instant::now());
                drop(store);
                self.applied.fetch_add(1, Ordering::Relaxed);
                Ingested::Applied
            }
            CacheEvent::Remove { key, revision } => {
                let mut store = self.store.write();
                if store.current_revision(&key).is_some_and(|cur| revision <= cur) {
                    drop(store);
                    return self.discard_stale(&key, revision);
                }
                if let Some(entries) = store.kinds.get_mut(&key.kind) {
                    entries.remove(&key.id);
                }
                store
                    .tombstones
                    .insert(key, revision, self.config.tombstone_capacity);
                store.last_update = Some(Instant::now());
                drop(store);
                self.applied.fetch_add(1, Ordering::Relaxed);
                Ingested::Applied
            }
            CacheEvent::Channel { channel, data } => {
                self.history.lock().record(channel, data);
                Ingested::Recorded
            }
            CacheEvent::SnapshotComplete => {
                if self.warmup.advance(WarmupState::Warm) {
                    tracing::info!(entries = self.store.read().len(), "event cache warm");
                }
                Ingested::Warm
            }
        }
    }

    fn discard_stale(&self, key: &EntityKey, revision: u64) -> Ingested {
        self.stale.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(key = %key, revision, "discarding stale event");
        Ingested::Stale
    }

    // -- warmup ---------------------------------------------------------------

    pub fn warmup_state(&self) -> WarmupState {
        self.warmup.state()
    }

    /// States the cache has passed through, starting with `Cold`.
    pub fn warmup_history(&self) -> Vec<WarmupState> {
        self.warmup.history()
    }

    pub fn is_warm(&self) -> bool {
        self.warmup_state() == WarmupState::Warm
    }

    /// Block until the initial snapshot is complete or `timeout` elapses.
    pub fn await_warm(&self, timeout: Duration) -> WarmupOutcome {
        self.warmup.wait_warm(timeout)
    }

    // -- reads ----------------------------------------------------------------

    /// Current entry for `key`. Never blocks on warmup.
    pub fn get(&self, key: &EntityKey) -> Option<Arc<EventCacheEntry>> {
        self.store.read().entry(key).cloned()
    }

    /// Start a lazy query over one entity kind.
    pub fn query(&self, kind: EntityKind) -> QueryRef<'_> {
        QueryRef::new(self, kind)
    }

    /// Run `f` against the entries of `kind` under a single read lock.
    pub(crate) fn with_kind<R>(
        &self,
        kind: EntityKind,
        f: impl FnOnce(Option<&BTreeMap<i64, Arc<EventCacheEntry>>>) -> R,
    ) -> R {
        let store = self.store.read();
        f(store.kinds.get(&kind))
    }

    pub(crate) fn with_store<R>(&self, f: impl FnOnce(&Store) -> R) -> R {
        f(&self.store.read())
    }

    /// Value of varp `id`, if the client has reported it.
    pub fn varp(&self, id: i64) -> Option<i64> {
        self.get(&EntityKey::new(EntityKind::Varp, id))
            .and_then(|e| e.int("value"))
    }

    /// Value of a varp by constant name (`"QUEST_POINTS"`).
    pub fn varp_by_name(&self, name: &str) -> Option<i64> {
        self.constants.varp_id(name).and_then(|id| self.varp(id))
    }

    /// Value of a varbit, read out of its varp through the accessor table.
    pub fn varbit(&self, name: &str) -> Option<i64> {
        self.read_varbit(self.constants.varbit(name)?)
    }

    /// Value of varbit `id`.
    pub fn varbit_by_id(&self, id: i64) -> Option<i64> {
        self.read_varbit(self.constants.varbit_by_id(id)?)
    }

    fn read_varbit(&self, accessor: BitAccessor) -> Option<i64> {
        let value = self.varp(i64::from(accessor.varp))?;
        Some(accessor.extract(value))
    }

    /// Up to `n` most recent events on `channel`, oldest first.
    pub fn recent_events(&self, channel: &str, n: usize) -> Vec<RecordedEvent> {
        self.history.lock().recent(channel, n)
    }

    pub fn event_channels(&self) -> Vec<String> {
        self.history.lock().channels()
    }

    /// When an entry was last changed.
    pub fn last_update(&self) -> Option<Instant> {
        self.store.read().last_update
    }

    /// Time since the last change, `None` if nothing has been applied.
    pub fn age(&self) -> Option<Duration> {
        self.last_update().map(|t| t.elapsed())
    }

    /// `true` if an update was applied within `max_age`.
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        self.age().is_some_and(|age| age <= max_age)
    }

    pub fn stats(&self) -> CacheStats {
        let store = self.store.read();
        CacheStats {
            applied: self.applied.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            channel_events: self.history.lock().total_recorded(),
            entries: store.len(),
            tombstones: store.tombstones.len(),
        }
    }

    /// Drop every entry, removal stamp and recorded channel event.
    ///
    /// Warmup state and the lifetime counters are kept. Updates applied
    /// after this call are accepted at any revision.
    pub fn clear(&self) {
        let mut store = self.store.write();
        let dropped = store.len();
        store.kinds.clear();
        store.tombstones.clear();
        store.last_update = None;
        drop(store);
        self.history.lock().clear();
        tracing::info!(entries = dropped, "event cache cleared");
    }

    /// A deterministic, hashed copy of every entry.
    pub fn capture_snapshot(&self) -> CacheSnapshot {
        CacheSnapshot::capture(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shadow_resources::constants::NameTable;

    use crate::consumer::IterSource;
    use crate::schema::AttrValue;

    fn cache() -> EventCache {
        let mut constants = GameConstants::new();
        constants.insert_name(NameTable::Items, 1965, "Cabbage");
        constants.insert_varbit(4070, "spellbook", BitAccessor { varp: 439, lsb: 0, msb: 1 });
        EventCache::new(EventCacheConfig::default(), Arc::new(constants))
    }

    fn npc_key(id: i64) -> EntityKey {
        EntityKey::new(EntityKind::Npc, id)
    }

    fn update(id: i64, revision: u64, attrs: Value) -> Value {
        json!({"type": "update", "kind": "npc", "key": id, "revision": revision, "attributes": attrs})
    }

    // -- 1. revision ordering -------------------------------------------------

    #[test]
    fn newer_revision_wins_regardless_of_arrival_order() {
        let c = cache();
        assert_eq!(c.ingest(&update(1, 5, json!({"x": 50}))), Ingested::Applied);
        assert_eq!(c.ingest(&update(1, 3, json!({"x": 30}))), Ingested::Stale);
        assert_eq!(c.ingest(&update(1, 5, json!({"x": 55}))), Ingested::Stale);

        let entry = c.get(&npc_key(1)).unwrap();
        assert_eq!(entry.revision, 5);
        assert_eq!(entry.int("x"), Some(50));
        assert_eq!(c.stats().stale, 2);
    }

    #[test]
    fn full_update_replaces_partial_merges() {
        let c = cache();
        c.ingest(&update(1, 1, json!({"x": 1, "y": 2, "name": "Man"})));
        c.ingest(&json!({"type": "update", "kind": "npc", "key": 1, "revision": 2,
                         "mode": "partial", "attributes": {"x": 9, "name": null}}));
        let merged = c.get(&npc_key(1)).unwrap();
        assert_eq!(merged.int("x"), Some(9));
        assert_eq!(merged.int("y"), Some(2));
        assert_eq!(merged.get("name"), None);

        c.ingest(&update(1, 3, json!({"plane": 1})));
        let full = c.get(&npc_key(1)).unwrap();
        assert_eq!(full.attributes.len(), 1);
        assert_eq!(full.int("plane"), Some(1));
    }

    #[test]
    fn removal_tombstone_blocks_older_updates() {
        let c = cache();
        c.ingest(&update(1, 1, json!({"x": 1})));
        let held = c.get(&npc_key(1)).unwrap();

        assert_eq!(
            c.ingest(&json!({"type": "remove", "kind": "npc", "key": 1, "revision": 4})),
            Ingested::Applied
        );
        assert!(c.get(&npc_key(1)).is_none());
        assert_eq!(c.ingest(&update(1, 3, json!({"x": 3}))), Ingested::Stale);
        assert!(c.get(&npc_key(1)).is_none());
        assert_eq!(c.ingest(&update(1, 5, json!({"x": 5}))), Ingested::Applied);
        assert_eq!(c.get(&npc_key(1)).unwrap().int("x"), Some(5));

        // A reader's snapshot of the old entry is unaffected.
        assert_eq!(held.int("x"), Some(1));
    }

    #[test]
    fn tombstones_stay_bounded_under_churn() {
        let c = EventCache::new(
            EventCacheConfig {
                tombstone_capacity: 64,
                ..EventCacheConfig::default()
            },
            Arc::new(GameConstants::default()),
        );
        for id in 0..10_000 {
            c.ingest(&update(id, 1, json!({"x": 1})));
            c.ingest(&json!({"type": "remove", "kind": "npc", "key": id, "revision": 2}));
        }
        let stats = c.stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.tombstones, 64);

        // Recent removals still block stale updates; evicted ones do not.
        assert_eq!(c.ingest(&update(9_999, 1, json!({}))), Ingested::Stale);
        assert_eq!(c.ingest(&update(0, 1, json!({}))), Ingested::Applied);
    }

    #[test]
    fn clear_drops_entries_tombstones_and_history() {
        let c = cache();
        c.ingest(&update(1, 5, json!({"x": 1})));
        c.ingest(&update(2, 5, json!({"x": 2})));
        c.ingest(&json!({"type": "remove", "kind": "npc", "key": 2, "revision": 6}));
        c.ingest(&json!({"type": "event", "channel": "chat", "data": "hi"}));

        c.clear();
        let stats = c.stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.tombstones, 0);
        assert_eq!(stats.applied, 3);
        assert!(c.recent_events("chat", 10).is_empty());
        assert!(c.last_update().is_none());

        assert_eq!(c.ingest(&update(1, 1, json!({"x": 9}))), Ingested::Applied);
        assert_eq!(c.ingest(&update(2, 1, json!({"x": 9}))), Ingested::Applied);
        assert_eq!(c.stats().channel_events, 1);
    }

    // -- 2. malformed events --------------------------------------------------

    #[test]
    fn malformed_events_are_counted_and_ignored() {
        let c = cache();
        assert!(matches!(c.ingest(&json!("garbage")), Ingested::Malformed(_)));
        assert!(matches!(
            c.ingest(&update(1, 1, json!({"nonsense": 1}))),
            Ingested::Malformed(_)
        ));
        assert_eq!(c.ingest(&update(1, 1, json!({"x": 1}))), Ingested::Applied);
        let stats = c.stats();
        assert_eq!(stats.malformed, 2);
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.entries, 1);
    }

    // -- 3. warmup ------------------------------------------------------------

    #[test]
    fn warm_only_after_snapshot_complete() {
        let c = Arc::new(cache());
        assert_eq!(c.warmup_state(), WarmupState::Cold);

        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = c.subscribe(rx).unwrap();
        assert!(c.warmup_state() >= WarmupState::Warming);

        tx.send(update(1, 1, json!({"x": 1}))).unwrap();
        assert_eq!(c.await_warm(Duration::from_millis(50)), WarmupOutcome::TimedOut);
        assert_eq!(c.warmup_state(), WarmupState::Warming);

        tx.send(json!({"type": "snapshot_complete"})).unwrap();
        assert_eq!(c.await_warm(Duration::from_secs(5)), WarmupOutcome::Warm);
        assert!(c.get(&npc_key(1)).is_some());

        drop(tx);
        assert_eq!(handle.join().unwrap(), 2);
        assert!(c.is_warm());
    }

    #[test]
    fn immediate_snapshot_still_passes_through_warming() {
        for _ in 0..200 {
            let c = Arc::new(cache());
            c.subscribe(IterSource::new(vec![json!({"type": "snapshot_complete"})]))
                .unwrap()
                .join()
                .unwrap();
            assert_eq!(
                c.warmup_history(),
                vec![WarmupState::Cold, WarmupState::Warming, WarmupState::Warm]
            );
        }
    }

    #[test]
    fn second_subscribe_is_rejected() {
        let c = Arc::new(cache());
        let first = c.subscribe(IterSource::new(Vec::new())).unwrap();
        assert!(matches!(
            c.subscribe(IterSource::new(Vec::new())),
            Err(StateError::AlreadySubscribed)
        ));
        first.join().unwrap();
    }

    #[test]
    fn consumer_thread_is_named() {
        let c = Arc::new(cache());
        let handle = c.subscribe(IterSource::new(Vec::new())).unwrap();
        assert_eq!(handle.thread_name(), Some("shadow-event-consumer"));
        handle.join().unwrap();
    }

    // -- 4. auxiliary reads ---------------------------------------------------

    #[test]
    fn varps_varbits_and_names() {
        let c = cache();
        c.ingest(&json!({"type": "update", "kind": "varp", "key": 439, "revision": 1,
                         "attributes": {"value": 0b1110}}));
        c.ingest(&json!({"type": "update", "kind": "inventory_item", "key": 0, "revision": 1,
                         "attributes": {"id": 1965, "quantity": 1}}));

        assert_eq!(c.varp(439), Some(14));
        assert_eq!(c.varbit("spellbook"), Some(0b10));
        assert_eq!(c.varbit("unknown"), None);
        assert_eq!(c.varbit_by_id(4070), Some(0b10));
        assert_eq!(c.varbit_by_id(1), None);
        assert_eq!(
            c.get(&EntityKey::new(EntityKind::InventoryItem, 0))
                .unwrap()
                .get("name"),
            Some(&AttrValue::from("Cabbage"))
        );
    }

    #[test]
    fn channel_events_and_freshness() {
        let c = cache();
        assert!(c.age().is_none());
        assert!(!c.is_fresh(Duration::from_secs(1)));

        for i in 0..3 {
            assert_eq!(
                c.ingest(&json!({"type": "event", "channel": "chat", "data": i})),
                Ingested::Recorded
            );
        }
        // Channel events are history only.
        assert!(c.last_update().is_none());
        assert_eq!(c.recent_events("chat", 2).len(), 2);
        assert_eq!(c.event_channels(), vec!["chat".to_owned()]);

        c.ingest(&update(1, 1, json!({})));
        assert!(c.is_fresh(Duration::from_secs(60)));
        assert_eq!(c.stats().channel_events, 3);
    }
}
