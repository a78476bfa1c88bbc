//! Static world objects: definitions, actions and spawn locations.
//!
//! The `objects` artifact stores one [`ObjectDefinition`] per object id.
//! [`ObjectIndex`] adds a spatial index keyed by packed position so
//! [`nearby`](ObjectIndex::nearby) scans one contiguous key range per x
//! column instead of every location.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Menu action slots an object definition carries.
pub const ACTION_SLOTS: usize = 5;

/// Largest x or y coordinate a packed position can hold.
pub const MAX_COORD: i32 = 0x7FFF;

/// A world tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
    pub plane: u8,
}

impl Location {
    pub fn new(x: i32, y: i32, plane: u8) -> Self {
        Self { x, y, plane }
    }

    /// `[plane:2][x:15][y:15]`, the client's packed coordinate layout.
    pub fn pack(self) -> u32 {
        (u32::from(self.plane & 0b11) << 30)
            | ((self.x as u32 & MAX_COORD as u32) << 15)
            | (self.y as u32 & MAX_COORD as u32)
    }

    pub fn unpack(packed: u32) -> Self {
        Self {
            x: ((packed >> 15) & MAX_COORD as u32) as i32,
            y: (packed & MAX_COORD as u32) as i32,
            plane: (packed >> 30) as u8,
        }
    }

    /// Chebyshev (king-move) distance, ignoring the plane.
    pub fn distance(self, other: Location) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

/// One object id as stored in the artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Exactly [`ACTION_SLOTS`] entries when present; empty slots are `None`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Option<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
}

impl ObjectDefinition {
    pub fn has_action(&self, action: &str) -> bool {
        self.actions.iter().flatten().any(|a| a == action)
    }
}

/// How [`ObjectIndex::by_name`] compares names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatch {
    /// Case-sensitive equality.
    Exact,
    /// Case-insensitive substring.
    Contains,
}

/// An object placed near a queried tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NearbyObject<'a> {
    pub id: i64,
    pub name: Option<&'a str>,
    pub location: Location,
    pub distance: i32,
}

/// Object definitions plus a packed-position index over their locations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectIndex {
    definitions: BTreeMap<i64, ObjectDefinition>,
    positions: BTreeMap<u32, Vec<i64>>,
}

impl ObjectIndex {
    pub fn new(definitions: BTreeMap<i64, ObjectDefinition>) -> Self {
        let mut positions: BTreeMap<u32, Vec<i64>> = BTreeMap::new();
        for (id, definition) in &definitions {
            for location in &definition.locations {
                positions.entry(location.pack()).or_default().push(*id);
            }
        }
        Self {
            definitions,
            positions,
        }
    }

    pub fn get(&self, id: i64) -> Option<&ObjectDefinition> {
        self.definitions.get(&id)
    }

    pub fn name(&self, id: i64) -> Option<&str> {
        self.get(id).and_then(|d| d.name.as_deref())
    }

    /// Every spawn location of `id`; empty for unknown ids.
    pub fn locations(&self, id: i64) -> &[Location] {
        self.get(id).map(|d| d.locations.as_slice()).unwrap_or_default()
    }

    /// Objects whose name matches `name`, ordered by id.
    pub fn by_name(&self, name: &str, mode: NameMatch) -> Vec<(i64, &ObjectDefinition)> {
        let needle = name.to_lowercase();
        self.definitions
            .iter()
            .filter(|(_, d)| match (mode, d.name.as_deref()) {
                (NameMatch::Exact, Some(n)) => n == name,
                (NameMatch::Contains, Some(n)) => n.to_lowercase().contains(&needle),
                (_, None) => false,
            })
            .map(|(id, d)| (*id, d))
            .collect()
    }

    /// Objects offering `action` in any slot, ordered by id.
    pub fn with_action(&self, action: &str) -> Vec<(i64, &ObjectDefinition)> {
        self.definitions
            .iter()
            .filter(|(_, d)| d.has_action(action))
            .map(|(id, d)| (*id, d))
            .collect()
    }

    /// Objects on `plane` within `radius` tiles (Chebyshev) of `(x, y)`,
    /// nearest first. Ties are ordered by id, then location.
    pub fn nearby(&self, x: i32, y: i32, plane: u8, radius: i32) -> Vec<NearbyObject<'_>> {
        if radius < 0 || plane > 3 {
            return Vec::new();
        }
        let centre = Location::new(x, y, plane);
        let min_x = x.saturating_sub(radius).max(0);
        let max_x = x.saturating_add(radius).min(MAX_COORD);
        let min_y = y.saturating_sub(radius).max(0);
        let max_y = y.saturating_add(radius).min(MAX_COORD);
        if min_x > max_x || min_y > max_y {
            return Vec::new();
        }

        let mut found = Vec::new();
        for column in min_x..=max_x {
            let low = Location::new(column, min_y, plane).pack();
            let high = Location::new(column, max_y, plane).pack();
            for (packed, ids) in self.positions.range(low..=high) {
                let location = Location::unpack(*packed);
                for id in ids {
                    found.push(NearbyObject {
                        id: *id,
                        name: self.name(*id),
                        location,
                        distance: location.distance(centre),
                    });
                }
            }
        }
        found.sort_by_key(|o| (o.distance, o.id, o.location));
        found
    }

    /// Distinct object ids.
    pub fn count_objects(&self) -> usize {
        self.definitions.len()
    }

    /// Spawn locations across all objects.
    pub fn count_locations(&self) -> usize {
        self.definitions.values().map(|d| d.locations.len()).sum()
    }

    /// Id to name, for objects that have one.
    pub fn names(&self) -> BTreeMap<i64, String> {
        self.definitions
            .iter()
            .filter_map(|(id, d)| d.name.clone().map(|n| (*id, n)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
