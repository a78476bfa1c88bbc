//! Entity keys and cache entries.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{AttrValue, EntityKind};

/// Attribute name to value. Ordered, so entries serialize deterministically.
pub type Attributes = BTreeMap<String, AttrValue>;

/// Identifies one entity: its kind plus an id or slot number.
///
/// For containers (inventory, bank, equipment) the id is the slot; for world
/// entities it is the client's index; for varps and skills it is the
/// variable or skill number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: i64,
}

impl EntityKey {
    pub fn new(kind: EntityKind, id: i64) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// The current state of one entity.
///
/// Entries are immutable; an update builds a new entry and swaps it in, so a
/// reader holding an `Arc<EventCacheEntry>` never sees a half-applied update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCacheEntry {
    pub key: EntityKey,
    /// Revision stamp of the last event applied to this entry.
    pub revision: u64,
    pub attributes: Attributes,
}

impl EventCacheEntry {
    pub fn get(&self, attribute: &str) -> Option<&AttrValue> {
        self.attributes.get(attribute)
    }

    pub fn int(&self, attribute: &str) -> Option<i64> {
        self.get(attribute).and_then(AttrValue::as_int)
    }

    pub fn text(&self, attribute: &str) -> Option<&str> {
        self.get(attribute).and_then(AttrValue::as_text)
    }
}
