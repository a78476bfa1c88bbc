//! Shadow State -- a thread-safe, event-fed mirror of live game state.
//!
//! The [`EventCache`](cache::EventCache) consumes a stream of JSON events from
//! the game client on a single background thread and keeps one entry per
//! entity key. Readers on any thread take point lookups or build lazy
//! [`QueryRef`](query::QueryRef)s that are evaluated against one consistent
//! view of the store. The cache reports "warm" only after the source has
//! explicitly signalled that its initial snapshot is complete.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use shadow_state::prelude::*;
//!
//! let cache = Arc::new(EventCache::new(EventCacheConfig::default(), Arc::new(GameConstants::default())));
//! let events = vec![
//!     serde_json::json!({"type": "update", "kind": "npc", "key": 7, "revision": 1,
//!                        "attributes": {"id": 3106, "name": "Man", "x": 3222, "y": 3218, "plane": 0}}),
//!     serde_json::json!({"type": "snapshot_complete"}),
//! ];
//! let consumer = cache.subscribe(IterSource::new(events)).unwrap();
//!
//! assert_eq!(cache.await_warm(Duration::from_secs(5)), WarmupOutcome::Warm);
//! let near = cache.query(EntityKind::Npc)
//!     .filter_range("x", 3200..3300).unwrap()
//!     .to_list();
//! assert_eq!(near.len(), 1);
//! consumer.join().unwrap();
//! ```

#![deny(unsafe_code)]

pub mod cache;
pub mod consumer;
pub mod entity;
pub mod event;
pub mod history;
pub mod query;
pub mod schema;
pub mod snapshot;
pub mod warmup;

/// Re-export of the resources crate, whose constants the cache decodes with.
pub use shadow_resources;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by event cache and query operations.
///
/// Malformed events are not errors: they are discarded and counted in
/// [`CacheStats`](cache::CacheStats). A warmup timeout is the
/// [`WarmupOutcome::TimedOut`](warmup::WarmupOutcome) value.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// A query referenced an attribute the entity kind does not have, or
    /// compared it against a value of the wrong type.
    #[error("invalid query on '{kind}': {reason}")]
    InvalidQuery {
        kind: schema::EntityKind,
        reason: String,
    },

    /// [`subscribe`](cache::EventCache::subscribe) was called twice.
    #[error("event cache already has a consumer; only one subscription is allowed")]
    AlreadySubscribed,

    /// The background consumer thread could not be started.
    #[error("failed to spawn event consumer thread: {0}")]
    ConsumerSpawn(#[source] std::io::Error),

    /// The background consumer thread panicked.
    #[error("event consumer thread panicked")]
    ConsumerPanicked,
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::cache::{CacheStats, EventCache, EventCacheConfig};
    pub use crate::consumer::{ConsumerHandle, EventSource, IterSource};
    pub use crate::entity::{Attributes, EntityKey, EventCacheEntry};
    pub use crate::event::{CacheEvent, DecodeError, UpdateMode};
    pub use crate::history::RecordedEvent;
    pub use crate::query::{QueryRef, QueryRow};
    pub use crate::schema::{AttrType, AttrValue, EntityKind};
    pub use crate::snapshot::CacheSnapshot;
    pub use crate::warmup::{WarmupOutcome, WarmupState};
    pub use crate::StateError;
    pub use shadow_resources::constants::GameConstants;
}
