//! Decoding raw JSON events from the game client.
//!
//! Wire format, one JSON object per event:
//!
//! ```json
//! {"type": "update", "kind": "npc", "key": 12, "revision": 40, "mode": "partial",
//!  "attributes": {"x": 3201, "combat_level": null}}
//! {"type": "remove", "kind": "ground_item", "key": 3, "revision": 41}
//! {"type": "event", "channel": "chat", "data": {"message": "Welcome"}}
//! {"type": "snapshot_complete"}
//! ```
//!
//! `mode` defaults to `"full"`. A `null` attribute value clears that
//! attribute. Positioned kinds also accept `packed_position`, the client's
//! 32-bit packed coordinate (plane in bits 30-31, x in bits 15-29, y in bits
//! 0-14), which is expanded into `x`, `y` and `plane`.
//!
//! Decoding consults [`GameConstants`] to fill in the `name` of items, NPCs
//! and objects when the event carries only an `id`.

use serde_json::{Map, Value};
use shadow_resources::constants::GameConstants;

use crate::entity::{Attributes, EntityKey};
use crate::schema::{AttrType, AttrValue, EntityKind};

/// Full updates replace the entry; partial updates merge onto it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Full,
    Partial,
}

/// A decoded event.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    Update {
        key: EntityKey,
        revision: u64,
        mode: UpdateMode,
        attributes: Attributes,
        /// Attributes explicitly set to `null`.
        cleared: Vec<String>,
    },
    Remove {
        key: EntityKey,
        revision: u64,
    },
    /// A transient notification recorded in the per-channel history.
    Channel {
        channel: String,
        data: Value,
    },
    /// The source has delivered its complete initial state.
    SnapshotComplete,
}

/// Why an event was discarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("event is not a JSON object")]
    NotAnObject,

    #[error("event is missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' has the wrong type, expected {expected}")]
    BadField {
        field: &'static str,
        expected: &'static str,
    },

    #[error("unknown event type '{0}'")]
    UnknownType(String),

    #[error("unknown entity kind '{0}'")]
    UnknownKind(String),

    #[error("unknown update mode '{0}'")]
    UnknownMode(String),

    #[error("'{kind}' has no attribute '{attribute}'")]
    UnknownAttribute { kind: EntityKind, attribute: String },

    #[error("attribute '{attribute}' of '{kind}' expects {expected}")]
    TypeMismatch {
        kind: EntityKind,
        attribute: String,
        expected: AttrType,
    },
}

/// Decode one raw event.
pub fn decode(raw: &Value, constants: &GameConstants) -> Result<CacheEvent, DecodeError> {
    let obj = raw.as_object().ok_or(DecodeError::NotAnObject)?;
    let ty = str_field(obj, "type")?;

    match ty {
        "update" => decode_update(obj, constants),
        "remove" => Ok(CacheEvent::Remove {
            key: key_field(obj)?,
            revision: revision_field(obj)?,
        }),
        "event" => Ok(CacheEvent::Channel {
            channel: str_field(obj, "channel")?.to_owned(),
            data: obj.get("data").cloned().unwrap_or(Value::Null),
        }),
        "snapshot_complete" => Ok(CacheEvent::SnapshotComplete),
        other => Err(DecodeError::UnknownType(other.to_owned())),
    }
}

fn decode_update(obj: &Map<String, Value>, constants: &GameConstants) -> Result<CacheEvent, DecodeError> {
    let key = key_field(obj)?;
    let revision = revision_field(obj)?;
    let mode = match obj.get("mode") {
        None | Some(Value::Null) => UpdateMode::Full,
        Some(Value::String(m)) if m == "full" => UpdateMode::Full,
        Some(Value::String(m)) if m == "partial" => UpdateMode::Partial,
        Some(Value::String(m)) => return Err(DecodeError::UnknownMode(m.clone())),
        Some(_) => {
            return Err(DecodeError::BadField {
                field: "mode",
                expected: "string",
            })
        }
    };
    let raw_attrs = match obj.get("attributes") {
        None => Map::new(),
        Some(Value::Object(m)) => m.clone(),
        Some(_) => {
            return Err(DecodeError::BadField {
                field: "attributes",
                expected: "object",
            })
        }
    };

    let mut attributes = Attributes::new();
    let mut cleared = Vec::new();
    for (name, value) in &raw_attrs {
        if name == "packed_position" && key.kind.is_positioned() {
            let packed = value.as_i64().ok_or_else(|| DecodeError::BadField {
                field: "packed_position",
                expected: "integer",
            })?;
            let (x, y, plane) = unpack_position(packed);
            attributes.insert("x".to_owned(), AttrValue::Int(x));
            attributes.insert("y".to_owned(), AttrValue::Int(y));
            attributes.insert("plane".to_owned(), AttrValue::Int(plane));
            continue;
        }
        let ty = key
            .kind
            .attr_type(name)
            .ok_or_else(|| DecodeError::UnknownAttribute {
                kind: key.kind,
                attribute: name.clone(),
            })?;
        if value.is_null() {
            cleared.push(name.clone());
            continue;
        }
        let typed = AttrValue::from_json(value, ty).ok_or_else(|| DecodeError::TypeMismatch {
            kind: key.kind,
            attribute: name.clone(),
            expected: ty,
        })?;
        attributes.insert(name.clone(), typed);
    }

    annotate_name(key.kind, &mut attributes, constants);

    Ok(CacheEvent::Update {
        key,
        revision,
        mode,
        attributes,
        cleared,
    })
}

/// Fill in `name` from the kind's name table when only `id` was sent.
fn annotate_name(kind: EntityKind, attributes: &mut Attributes, constants: &GameConstants) {
    let Some(table) = kind.name_table() else {
        return;
    };
    if attributes.contains_key("name") {
        return;
    }
    let Some(id) = attributes.get("id").and_then(AttrValue::as_int) else {
        return;
    };
    if let Some(name) = constants.name(table, id) {
        attributes.insert("name".to_owned(), AttrValue::Text(name.to_owned()));
    }
}

/// Split a packed client coordinate into `(x, y, plane)`.
pub fn unpack_position(packed: i64) -> (i64, i64, i64) {
    let bits = packed as u32;
    let x = (bits >> 15) & 0x7FFF;
    let y = bits & 0x7FFF;
    let plane = (bits >> 30) & 0x3;
    (i64::from(x), i64::from(y), i64::from(plane))
}

/// Inverse of [`unpack_position`].
pub fn pack_position(x: i64, y: i64, plane: i64) -> i64 {
    let bits = ((plane as u32 & 0x3) << 30) | ((x as u32 & 0x7FFF) << 15) | (y as u32 & 0x7FFF);
    i64::from(bits)
}

fn str_field<'a>(obj: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, DecodeError> {
    match obj.get(field) {
        None => Err(DecodeError::MissingField(field)),
        Some(v) => v.as_str().ok_or(DecodeError::BadField {
            field,
            expected: "string",
        }),
    }
}

fn key_field(obj: &Map<String, Value>) -> Result<EntityKey, DecodeError> {
    let kind_name = str_field(obj, "kind")?;
    let kind = kind_name
        .parse::<EntityKind>()
        .map_err(DecodeError::UnknownKind)?;
    let id = obj
        .get("key")
        .ok_or(DecodeError::MissingField("key"))?
        .as_i64()
        .ok_or(DecodeError::BadField {
            field: "key",
            expected: "integer",
        })?;
    Ok(EntityKey::new(kind, id))
}

fn revision_field(obj: &Map<String, Value>) -> Result<u64, DecodeError> {
    obj.get("revision")
        .ok_or(DecodeError::MissingField("revision"))?
        .as_u64()
        .ok_or(DecodeError::BadField {
            field: "revision",
            expected: "non-negative integer",
        })
}
