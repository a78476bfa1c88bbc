//! The bundle of lookup tables the event cache decodes with.

use std::collections::BTreeMap;

use crate::artifact::{ArtifactPayload, BitAccessor, VarbitDefinition};
use crate::generate::constant_name;
use crate::objects::ObjectIndex;

/// Which name table a lookup goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameTable {
    Items,
    Objects,
    Npcs,
    Interfaces,
}

/// Game constants derived from the standard artifacts.
///
/// Cheap to share behind an `Arc`; immutable once built. An empty bundle
/// (`GameConstants::default()`) is valid and means "no data available".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameConstants {
    items: BTreeMap<i64, String>,
    objects: BTreeMap<i64, String>,
    npcs: BTreeMap<i64, String>,
    interfaces: BTreeMap<i64, String>,
    object_index: ObjectIndex,
    varps: BTreeMap<String, i64>,
    varp_names: BTreeMap<i64, String>,
    varbits: BTreeMap<String, VarbitDefinition>,
    varbit_names: BTreeMap<i64, String>,
}

impl GameConstants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a name table. Non-name-table payloads are ignored.
    pub fn with_names(mut self, table: NameTable, payload: &ArtifactPayload) -> Self {
        if let ArtifactPayload::NameTable(names) = payload {
            *self.table_mut(table) = names.clone();
        }
        self
    }

    /// Install the object index; its names also fill [`NameTable::Objects`].
    pub fn with_objects(mut self, payload: &ArtifactPayload) -> Self {
        if let ArtifactPayload::ObjectIndex(definitions) = payload {
            self.object_index = ObjectIndex::new(definitions.clone());
            self.objects = self.object_index.names();
        }
        self
    }

    pub fn with_varps(mut self, payload: &ArtifactPayload) -> Self {
        if let ArtifactPayload::ConstantSet(set) = payload {
            self.varp_names = set.iter().map(|(name, id)| (*id, name.clone())).collect();
            self.varps = set.clone();
        }
        self
    }

    pub fn with_varbits(mut self, payload: &ArtifactPayload) -> Self {
        if let ArtifactPayload::AccessorSet(set) = payload {
            self.varbit_names = set.iter().map(|(name, def)| (def.id, name.clone())).collect();
            self.varbits = set.clone();
        }
        self
    }

    /// Insert a single name, mostly for tests and hand-built bundles.
    pub fn insert_name(&mut self, table: NameTable, id: i64, name: impl Into<String>) {
        self.table_mut(table).insert(id, name.into());
    }

    pub fn insert_varbit(&mut self, id: i64, name: &str, accessor: BitAccessor) {
        let name = constant_name(name);
        self.varbit_names.insert(id, name.clone());
        self.varbits.insert(name, VarbitDefinition { id, accessor });
    }

    fn table_mut(&mut self, table: NameTable) -> &mut BTreeMap<i64, String> {
        match table {
            NameTable::Items => &mut self.items,
            NameTable::Objects => &mut self.objects,
            NameTable::Npcs => &mut self.npcs,
            NameTable::Interfaces => &mut self.interfaces,
        }
    }

    fn table(&self, table: NameTable) -> &BTreeMap<i64, String> {
        match table {
            NameTable::Items => &self.items,
            NameTable::Objects => &self.objects,
            NameTable::Npcs => &self.npcs,
            NameTable::Interfaces => &self.interfaces,
        }
    }

    pub fn name(&self, table: NameTable, id: i64) -> Option<&str> {
        self.table(table).get(&id).map(String::as_str)
    }

    pub fn item_name(&self, id: i64) -> Option<&str> {
        self.name(NameTable::Items, id)
    }

    pub fn interface_name(&self, id: i64) -> Option<&str> {
        self.name(NameTable::Interfaces, id)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Varp id for a constant name. Accepts display names as well
    /// (`"quest points"` finds `QUEST_POINTS`).
    pub fn varp_id(&self, name: &str) -> Option<i64> {
        self.varps.get(&constant_name(name)).copied()
    }

    /// Constant name of varp `id`.
    pub fn varp_name(&self, id: i64) -> Option<&str> {
        self.varp_names.get(&id).map(String::as_str)
    }

    /// Varbit accessor by name, normalized like [`varp_id`](Self::varp_id).
    pub fn varbit(&self, name: &str) -> Option<BitAccessor> {
        self.varbits.get(&constant_name(name)).map(|d| d.accessor)
    }

    pub fn varbit_by_id(&self, id: i64) -> Option<BitAccessor> {
        self.varbit_name(id).and_then(|name| self.varbits.get(name)).map(|d| d.accessor)
    }

    pub fn varbit_name(&self, id: i64) -> Option<&str> {
        self.varbit_names.get(&id).map(String::as_str)
    }

    /// Known varps as `(id, constant name)`, ordered by id. `filter` keeps
    /// names containing it, compared after the same normalization as
    /// lookups (`"quest"` matches `QUEST_POINTS`).
    pub fn list_varps(&self, filter: Option<&str>) -> Vec<(i64, &str)> {
        let needle = filter.map(constant_name);
        self.varp_names
            .iter()
            .filter(|(_, name)| needle.as_deref().map_or(true, |n| name.contains(n)))
            .map(|(id, name)| (*id, name.as_str()))
            .collect()
    }

    /// Known varbits as `(id, constant name, accessor)`, ordered by id and
    /// filtered like [`list_varps`](Self::list_varps).
    pub fn list_varbits(&self, filter: Option<&str>) -> Vec<(i64, &str, BitAccessor)> {
        let needle = filter.map(constant_name);
        self.varbit_names
            .iter()
            .filter(|(_, name)| needle.as_deref().map_or(true, |n| name.contains(n)))
            .filter_map(|(id, name)| {
                self.varbits
                    .get(name)
                    .map(|def| (*id, name.as_str(), def.accessor))
            })
            .collect()
    }

    /// Object definitions, locations and actions.
    pub fn objects(&self) -> &ObjectIndex {
        &self.object_index
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
            && self.objects.is_empty()
            && self.object_index.is_empty()
            && self.npcs.is_empty()
            && self.interfaces.is_empty()
            && self.varps.is_empty()
            && self.varbits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_normalize_names() {
        let mut c = GameConstants::new();
        c.insert_varbit(4070, "Spellbook", BitAccessor { varp: 439, lsb: 0, msb: 1 });
        let c = c.with_varps(&ArtifactPayload::ConstantSet(BTreeMap::from([(
            "QUEST_POINTS".to_owned(),
            101,
        )])));

        assert_eq!(c.varp_id("quest points"), Some(101));
        assert_eq!(c.varp_id("QUEST_POINTS"), Some(101));
        assert_eq!(c.varbit("spellbook").map(|a| a.varp), Some(439));
        assert!(c.varbit("unknown").is_none());
    }

    #[test]
    fn lookups_by_numeric_id_and_listing() {
        let varps = ArtifactPayload::ConstantSet(BTreeMap::from([
            ("QUEST_POINTS".to_owned(), 101),
            ("SLAYER_TASK".to_owned(), 394),
            ("QUEST_HELPER".to_owned(), 7),
        ]));
        let spellbook = BitAccessor { varp: 439, lsb: 0, msb: 1 };
        let varbits = ArtifactPayload::AccessorSet(BTreeMap::from([(
            "SPELLBOOK".to_owned(),
            VarbitDefinition { id: 4070, accessor: spellbook },
        )]));
        let c = GameConstants::new().with_varps(&varps).with_varbits(&varbits);

        assert_eq!(c.varp_name(394), Some("SLAYER_TASK"));
        assert_eq!(c.varp_name(5), None);
        assert_eq!(c.varbit_by_id(4070), Some(spellbook));
        assert_eq!(c.varbit_name(4070), Some("SPELLBOOK"));
        assert_eq!(c.varbit_by_id(1), None);

        assert_eq!(c.list_varps(None).len(), 3);
        assert_eq!(
            c.list_varps(Some("quest")),
            vec![(7, "QUEST_HELPER"), (101, "QUEST_POINTS")]
        );
        assert_eq!(c.list_varps(Some("task ")), vec![(394, "SLAYER_TASK")]);
        assert_eq!(c.list_varbits(Some("spell")), vec![(4070, "SPELLBOOK", spellbook)]);
        assert!(c.list_varbits(Some("prayer")).is_empty());
    }

    #[test]
    fn object_index_feeds_object_names() {
        use crate::objects::{Location, ObjectDefinition};

        let payload = ArtifactPayload::ObjectIndex(BTreeMap::from([(
            1276,
            ObjectDefinition {
                name: Some("Tree".to_owned()),
                actions: Vec::new(),
                locations: vec![Location::new(3200, 3200, 0)],
            },
        )]));
        let c = GameConstants::new().with_objects(&payload);
        assert_eq!(c.name(NameTable::Objects, 1276), Some("Tree"));
        assert_eq!(c.objects().count_locations(), 1);
        assert_eq!(c.objects().nearby(3201, 3201, 0, 1)[0].id, 1276);
        assert!(!c.is_empty());
    }

    #[test]
    fn wrong_payload_kind_is_ignored() {
        let c = GameConstants::new().with_varps(&ArtifactPayload::NameTable(BTreeMap::new()));
        assert!(c.is_empty());
        let c = c.with_names(
            NameTable::Interfaces,
            &ArtifactPayload::NameTable(BTreeMap::from([(149, "Inventory".to_owned())])),
        );
        assert_eq!(c.interface_name(149), Some("Inventory"));
        assert!(!c.is_empty());
    }
}
