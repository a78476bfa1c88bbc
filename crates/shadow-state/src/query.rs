//! Lazy queries over the event cache.
//!
//! A [`QueryRef`] is an immutable description of a selection: an entity
//! kind, a list of filters and an optional projection. Building one never
//! touches the store. Each builder method returns a new `QueryRef`, leaving
//! the receiver usable, and validates its attribute against the kind's
//! schema so mistakes fail at build time with
//! [`StateError::InvalidQuery`].
//!
//! The terminal operations ([`to_list`](QueryRef::to_list),
//! [`first`](QueryRef::first), [`count`](QueryRef::count)) each evaluate
//! against one consistent view of the store. Results are ordered by entity
//! id.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use shadow_state::prelude::*;
//!
//! let cache = EventCache::new(EventCacheConfig::default(), Arc::new(GameConstants::default()));
//! let coins = cache
//!     .query(EntityKind::InventoryItem)
//!     .filter_eq("id", 995)
//!     .unwrap();
//! let nearby = cache.query(EntityKind::Npc).filter_range("combat_level", ..=20).unwrap();
//!
//! assert_eq!(coins.count(), 0);
//! assert!(nearby.first().is_none());
//! assert!(cache.query(EntityKind::Npc).filter_eq("hitpoints", 10).is_err());
//! ```

use std::fmt;
use std::ops::{Bound, RangeBounds};
use std::sync::Arc;

use serde::Serialize;

use crate::cache::EventCache;
use crate::entity::{Attributes, EntityKey, EventCacheEntry};
use crate::schema::{AttrType, AttrValue, EntityKind};
use crate::StateError;

#[derive(Debug, Clone, PartialEq)]
enum Filter {
    Eq {
        attribute: String,
        value: AttrValue,
    },
    Range {
        attribute: String,
        start: Bound<i64>,
        end: Bound<i64>,
    },
}

impl Filter {
    fn matches(&self, entry: &EventCacheEntry) -> bool {
        match self {
            Self::Eq { attribute, value } => entry.get(attribute) == Some(value),
            Self::Range {
                attribute,
                start,
                end,
            } => entry
                .int(attribute)
                .is_some_and(|v| (*start, *end).contains(&v)),
        }
    }
}

/// One materialized row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRow {
    pub key: EntityKey,
    pub revision: u64,
    /// All attributes, or only the selected ones if the query has a projection.
    pub attributes: Attributes,
}

impl QueryRow {
    pub fn get(&self, attribute: &str) -> Option<&AttrValue> {
        self.attributes.get(attribute)
    }
}

/// A deferred, immutable selection over one entity kind.
#[derive(Clone)]
pub struct QueryRef<'a> {
    cache: &'a EventCache,
    kind: EntityKind,
    filters: Vec<Filter>,
    projection: Option<Vec<String>>,
}

impl fmt::Debug for QueryRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryRef")
            .field("kind", &self.kind)
            .field("filters", &self.filters)
            .field("projection", &self.projection)
            .finish()
    }
}

impl<'a> QueryRef<'a> {
    pub(crate) fn new(cache: &'a EventCache, kind: EntityKind) -> Self {
        Self {
            cache,
            kind,
            filters: Vec::new(),
            projection: None,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    fn invalid(&self, reason: String) -> StateError {
        StateError::InvalidQuery {
            kind: self.kind,
            reason,
        }
    }

    fn check_attribute(&self, attribute: &str) -> Result<AttrType, StateError> {
        self.kind.attr_type(attribute).ok_or_else(|| {
            self.invalid(format!(
                "unknown attribute '{attribute}'. Known attributes: [{}]",
                self.kind.attr_names()
            ))
        })
    }

    fn with_filter(&self, filter: Filter) -> Self {
        let mut next = self.clone();
        next.filters.push(filter);
        next
    }

    /// Keep entities whose `attribute` equals `value`.
    pub fn filter_eq(&self, attribute: &str, value: impl Into<AttrValue>) -> Result<Self, StateError> {
        let value = value.into();
        let ty = self.check_attribute(attribute)?;
        if value.ty() != ty {
            return Err(self.invalid(format!(
                "attribute '{attribute}' is {ty}, cannot compare with {} value {value}",
                value.ty()
            )));
        }
        Ok(self.with_filter(Filter::Eq {
            attribute: attribute.to_owned(),
            value,
        }))
    }

    /// Keep entities whose integer `attribute` lies in `range`.
    pub fn filter_range(&self, attribute: &str, range: impl RangeBounds<i64>) -> Result<Self, StateError> {
        let ty = self.check_attribute(attribute)?;
        if ty != AttrType::Int {
            return Err(self.invalid(format!(
                "range filter needs an int attribute, '{attribute}' is {ty}"
            )));
        }
        Ok(self.with_filter(Filter::Range {
            attribute: attribute.to_owned(),
            start: range.start_bound().cloned(),
            end: range.end_bound().cloned(),
        }))
    }

    /// Restrict materialized rows to `attributes`.
    pub fn select(&self, attributes: &[&str]) -> Result<Self, StateError> {
        for attribute in attributes {
            self.check_attribute(attribute)?;
        }
        let mut next = self.clone();
        next.projection = Some(attributes.iter().map(|a| (*a).to_owned()).collect());
        Ok(next)
    }

    fn matches(&self, entry: &EventCacheEntry) -> bool {
        self.filters.iter().all(|f| f.matches(entry))
    }

    fn row(&self, entry: &Arc<EventCacheEntry>) -> QueryRow {
        let attributes = match &self.projection {
            None => entry.attributes.clone(),
            Some(names) => names
                .iter()
                .filter_map(|n| entry.attributes.get_key_value(n))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        QueryRow {
            key: entry.key,
            revision: entry.revision,
            attributes,
        }
    }

    // -- terminal operations --------------------------------------------------

    /// Every matching row, ordered by id.
    pub fn to_list(&self) -> Vec<QueryRow> {
        self.cache.with_kind(self.kind, |entries| {
            entries
                .into_iter()
                .flat_map(|m| m.values())
                .filter(|e| self.matches(e))
                .map(|e| self.row(e))
                .collect()
        })
    }

    /// The matching row with the lowest id.
    pub fn first(&self) -> Option<QueryRow> {
        self.cache.with_kind(self.kind, |entries| {
            entries?
                .values()
                .find(|e| self.matches(e))
                .map(|e| self.row(e))
        })
    }

    pub fn count(&self) -> usize {
        self.cache.with_kind(self.kind, |entries| {
            entries
                .into_iter()
                .flat_map(|m| m.values())
                .filter(|e| self.matches(e))
                .count()
        })
    }

    /// Matching entries themselves rather than copied rows.
    pub fn entries(&self) -> Vec<Arc<EventCacheEntry>> {
        self.cache.with_kind(self.kind, |entries| {
            entries
                .into_iter()
                .flat_map(|m| m.values())
                .filter(|e| self.matches(e))
                .cloned()
                .collect()
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EventCacheConfig;
    use serde_json::json;
    use shadow_resources::constants::GameConstants;

    fn populated() -> EventCache {
        let cache = EventCache::new(EventCacheConfig::default(), Arc::new(GameConstants::default()));
        let npcs = [
            (3, "Goblin", 3200, 2),
            (1, "Man", 3222, 2),
            (2, "Guard", 3250, 21),
            (4, "Man", 3400, 2),
        ];
        for (id, name, x, level) in npcs {
            cache.ingest(&json!({"type": "update", "kind": "npc", "key": id, "revision": 1,
                "attributes": {"name": name, "x": x, "y": 3200, "plane": 0, "combat_level": level}}));
        }
        cache
    }

    #[test]
    fn building_is_lazy_and_reusable() {
        let cache = populated();
        let men = cache.query(EntityKind::Npc).filter_eq("name", "Man").unwrap();
        assert_eq!(men.count(), 2);

        cache.ingest(&json!({"type": "update", "kind": "npc", "key": 9, "revision": 1,
                             "attributes": {"name": "Man"}}));
        // Evaluated on materialization, not on build.
        assert_eq!(men.count(), 3);

        let near_men = men.filter_range("x", 3000..3300).unwrap();
        assert_eq!(near_men.count(), 1);
        assert_eq!(men.count(), 3);
    }

    #[test]
    fn results_are_ordered_by_id() {
        let cache = populated();
        let ids: Vec<_> = cache
            .query(EntityKind::Npc)
            .to_list()
            .into_iter()
            .map(|r| r.key.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(
            cache.query(EntityKind::Npc).filter_eq("combat_level", 2).unwrap().first().map(|r| r.key.id),
            Some(1)
        );
    }

    #[test]
    fn range_bounds_are_respected() {
        let cache = populated();
        let q = cache.query(EntityKind::Npc);
        assert_eq!(q.filter_range("x", 3222..=3250).unwrap().count(), 2);
        assert_eq!(q.filter_range("x", 3222..3250).unwrap().count(), 1);
        assert_eq!(q.filter_range("x", ..3222).unwrap().count(), 1);
        assert_eq!(q.filter_range("x", 3300..).unwrap().count(), 1);
        assert_eq!(q.filter_range("x", ..).unwrap().count(), 4);
    }

    #[test]
    fn projection_limits_attributes() {
        let cache = populated();
        let rows = cache
            .query(EntityKind::Npc)
            .filter_eq("name", "Guard")
            .unwrap()
            .select(&["x", "combat_level"])
            .unwrap()
            .to_list();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].attributes.len(), 2);
        assert_eq!(rows[0].get("combat_level"), Some(&AttrValue::Int(21)));
        assert_eq!(rows[0].get("name"), None);
    }

    #[test]
    fn invalid_queries_fail_at_build_time() {
        let cache = populated();
        let q = cache.query(EntityKind::Npc);

        for result in [
            q.filter_eq("hitpoints", 5),
            q.filter_eq("x", "far"),
            q.filter_range("name", 0..5),
            q.select(&["x", "nope"]),
        ] {
            match result {
                Err(StateError::InvalidQuery { kind, .. }) => assert_eq!(kind, EntityKind::Npc),
                other => panic!("expected InvalidQuery, got {other:?}"),
            }
        }
    }

    #[test]
    fn empty_kind_yields_nothing() {
        let cache = populated();
        let q = cache.query(EntityKind::BankItem);
        assert!(q.to_list().is_empty());
        assert!(q.first().is_none());
        assert_eq!(q.count(), 0);
        assert!(q.entries().is_empty());
    }
}
