//! Derived artifact types.
//!
//! An artifact is a lookup table derived from one or more raw resources and
//! stored as a single JSON document under `generated/<id>.json`:
//!
//! ```json
//! {
//!   "provenance": { "artifact_id": "varps", "generator_version": 1,
//!                   "source_fingerprints": { "varps": "231" } },
//!   "payload": { "kind": "constant_set", "entries": { "QUEST_POINTS": 101 } }
//! }
//! ```
//!
//! The provenance block decides whether an artifact is current: it is
//! regenerated exactly when the generator version or any source fingerprint
//! differs from what is recorded.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::descriptor::{Fingerprint, ResourceDescriptor};
use crate::objects::ObjectDefinition;

/// Stable identifier of an artifact (`"items"`, `"varps"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtifactId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ArtifactId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The shape of table an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Numeric id to display name (items, objects, NPCs, interfaces).
    NameTable,
    /// Constant name to numeric id (varps).
    ConstantSet,
    /// Named bit-range accessors over varp values (varbits).
    AccessorSet,
    /// Object definitions with their actions and world locations.
    ObjectIndex,
}

/// What to generate and from which sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSpec {
    pub id: ArtifactId,
    pub kind: ArtifactKind,
    pub sources: Vec<ResourceDescriptor>,
}

impl ArtifactSpec {
    pub fn new(id: impl Into<ArtifactId>, kind: ArtifactKind, sources: Vec<ResourceDescriptor>) -> Self {
        Self {
            id: id.into(),
            kind,
            sources,
        }
    }
}

/// Inputs an artifact was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub artifact_id: ArtifactId,
    pub generator_version: u32,
    /// Source descriptor name to the fingerprint it had at generation time.
    pub source_fingerprints: BTreeMap<String, Fingerprint>,
}

impl Provenance {
    /// The provenance a fresh generation of `spec` would record.
    pub fn expected(spec: &ArtifactSpec, generator_version: u32) -> Self {
        Self {
            artifact_id: spec.id.clone(),
            generator_version,
            source_fingerprints: spec
                .sources
                .iter()
                .map(|d| (d.name.clone(), d.fingerprint.clone()))
                .collect(),
        }
    }
}

/// A bit range `[lsb, msb]` inside one varp's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitAccessor {
    pub varp: u32,
    pub lsb: u8,
    pub msb: u8,
}

impl BitAccessor {
    /// Read this accessor's bits out of `varp_value`.
    pub fn extract(&self, varp_value: i64) -> i64 {
        extract_bits(varp_value, self.lsb, self.msb)
    }
}

/// A varbit: its numeric id plus where its bits live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VarbitDefinition {
    pub id: i64,
    pub accessor: BitAccessor,
}

/// `(value >> lsb) & ((1 << (msb - lsb + 1)) - 1)` over the low 32 bits of
/// `value`. Requires `lsb <= msb <= 31`; out-of-range inputs are clamped.
pub fn extract_bits(value: i64, lsb: u8, msb: u8) -> i64 {
    let lsb = u32::from(lsb.min(31));
    let msb = u32::from(msb.min(31)).max(lsb);
    let width = msb - lsb + 1;
    let mask = if width >= 32 { u32::MAX } else { (1u32 << width) - 1 };
    // Varp values are 32-bit registers; reinterpret rather than sign-extend.
    let bits = value as u32;
    i64::from((bits >> lsb) & mask)
}

/// The table held by an artifact. Maps are ordered so output is byte-stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "entries", rename_all = "snake_case")]
pub enum ArtifactPayload {
    NameTable(BTreeMap<i64, String>),
    ConstantSet(BTreeMap<String, i64>),
    AccessorSet(BTreeMap<String, VarbitDefinition>),
    ObjectIndex(BTreeMap<i64, ObjectDefinition>),
}

impl ArtifactPayload {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::NameTable(_) => ArtifactKind::NameTable,
            Self::ConstantSet(_) => ArtifactKind::ConstantSet,
            Self::AccessorSet(_) => ArtifactKind::AccessorSet,
            Self::ObjectIndex(_) => ArtifactKind::ObjectIndex,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::NameTable(m) => m.len(),
            Self::ConstantSet(m) => m.len(),
            Self::AccessorSet(m) => m.len(),
            Self::ObjectIndex(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The on-disk document: provenance plus payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDocument {
    pub provenance: Provenance,
    pub payload: ArtifactPayload,
}

/// Result of a [`generate`](crate::generate::ArtifactGenerator::generate) call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub id: ArtifactId,
    pub generator_version: u32,
    pub source_fingerprints: BTreeMap<String, Fingerprint>,
    pub path: PathBuf,
    /// `false` when the existing output was already current.
    pub regenerated: bool,
}
