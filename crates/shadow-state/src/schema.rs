//! Static attribute schema per entity kind.
//!
//! Every queryable attribute is declared here with its type. Events are
//! decoded against this table and queries are validated against it when
//! they are built, so a typo in an attribute name fails immediately rather
//! than silently matching nothing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shadow_resources::constants::NameTable;

/// The categories of entity the cache tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    InventoryItem,
    BankItem,
    EquipmentItem,
    Npc,
    GameObject,
    GroundItem,
    Varp,
    Skill,
}

/// Type of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrType {
    Int,
    Text,
    Bool,
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Int => "int",
            Self::Text => "text",
            Self::Bool => "bool",
        })
    }
}

/// One declared attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrDef {
    pub name: &'static str,
    pub ty: AttrType,
}

const fn attr(name: &'static str, ty: AttrType) -> AttrDef {
    AttrDef { name, ty }
}

const ITEM_ATTRS: &[AttrDef] = &[
    attr("id", AttrType::Int),
    attr("quantity", AttrType::Int),
    attr("name", AttrType::Text),
    attr("noted", AttrType::Bool),
];

const NPC_ATTRS: &[AttrDef] = &[
    attr("id", AttrType::Int),
    attr("name", AttrType::Text),
    attr("x", AttrType::Int),
    attr("y", AttrType::Int),
    attr("plane", AttrType::Int),
    attr("combat_level", AttrType::Int),
];

const OBJECT_ATTRS: &[AttrDef] = &[
    attr("id", AttrType::Int),
    attr("name", AttrType::Text),
    attr("x", AttrType::Int),
    attr("y", AttrType::Int),
    attr("plane", AttrType::Int),
];

const GROUND_ITEM_ATTRS: &[AttrDef] = &[
    attr("id", AttrType::Int),
    attr("name", AttrType::Text),
    attr("quantity", AttrType::Int),
    attr("x", AttrType::Int),
    attr("y", AttrType::Int),
    attr("plane", AttrType::Int),
];

const VARP_ATTRS: &[AttrDef] = &[attr("value", AttrType::Int)];

const SKILL_ATTRS: &[AttrDef] = &[
    attr("level", AttrType::Int),
    attr("boosted_level", AttrType::Int),
    attr("xp", AttrType::Int),
];

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        Self::InventoryItem,
        Self::BankItem,
        Self::EquipmentItem,
        Self::Npc,
        Self::GameObject,
        Self::GroundItem,
        Self::Varp,
        Self::Skill,
    ];

    /// Wire name (`"inventory_item"`, `"npc"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InventoryItem => "inventory_item",
            Self::BankItem => "bank_item",
            Self::EquipmentItem => "equipment_item",
            Self::Npc => "npc",
            Self::GameObject => "game_object",
            Self::GroundItem => "ground_item",
            Self::Varp => "varp",
            Self::Skill => "skill",
        }
    }

    pub fn schema(self) -> &'static [AttrDef] {
        match self {
            Self::InventoryItem | Self::BankItem | Self::EquipmentItem => ITEM_ATTRS,
            Self::Npc => NPC_ATTRS,
            Self::GameObject => OBJECT_ATTRS,
            Self::GroundItem => GROUND_ITEM_ATTRS,
            Self::Varp => VARP_ATTRS,
            Self::Skill => SKILL_ATTRS,
        }
    }

    pub fn attr_type(self, name: &str) -> Option<AttrType> {
        self.schema().iter().find(|a| a.name == name).map(|a| a.ty)
    }

    /// Comma-separated attribute names, for error messages.
    pub fn attr_names(self) -> String {
        self.schema()
            .iter()
            .map(|a| a.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The name table that resolves this kind's `id` attribute, if any.
    pub fn name_table(self) -> Option<NameTable> {
        match self {
            Self::InventoryItem | Self::BankItem | Self::EquipmentItem | Self::GroundItem => {
                Some(NameTable::Items)
            }
            Self::Npc => Some(NameTable::Npcs),
            Self::GameObject => Some(NameTable::Objects),
            Self::Varp | Self::Skill => None,
        }
    }

    /// `true` if the kind carries a world position (`x`, `y`, `plane`).
    pub fn is_positioned(self) -> bool {
        self.attr_type("x").is_some()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// AttrValue
// ---------------------------------------------------------------------------

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl AttrValue {
    pub fn ty(&self) -> AttrType {
        match self {
            Self::Bool(_) => AttrType::Bool,
            Self::Int(_) => AttrType::Int,
            Self::Text(_) => AttrType::Text,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert a JSON value to `ty`. `None` if the JSON type does not match.
    pub fn from_json(value: &serde_json::Value, ty: AttrType) -> Option<Self> {
        match ty {
            AttrType::Int => value.as_i64().map(Self::Int),
            AttrType::Text => value.as_str().map(|s| Self::Text(s.to_owned())),
            AttrType::Bool => value.as_bool().map(Self::Bool),
        }
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_wire_names() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>(), Ok(kind));
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert!("widget".parse::<EntityKind>().is_err());
    }

    #[test]
    fn schema_lookups() {
        assert_eq!(EntityKind::Npc.attr_type("x"), Some(AttrType::Int));
        assert_eq!(EntityKind::BankItem.attr_type("noted"), Some(AttrType::Bool));
        assert_eq!(EntityKind::Varp.attr_type("name"), None);
        assert!(EntityKind::GroundItem.is_positioned());
        assert!(!EntityKind::InventoryItem.is_positioned());
        assert_eq!(EntityKind::Skill.attr_names(), "level, boosted_level, xp");
    }

    #[test]
    fn json_conversion_respects_type() {
        let v = serde_json::json!(5);
        assert_eq!(AttrValue::from_json(&v, AttrType::Int), Some(AttrValue::Int(5)));
        assert_eq!(AttrValue::from_json(&v, AttrType::Text), None);
        assert_eq!(AttrValue::from_json(&serde_json::json!(1.5), AttrType::Int), None);
    }
}
