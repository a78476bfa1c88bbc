//! Artifact generation from raw resources.
//!
//! [`ArtifactGenerator::generate`] is the single entry point for every
//! artifact kind. It compares the provenance recorded in the existing output
//! against the provenance the `ArtifactSpec` would produce; if they match, nothing is
//! read, fetched or written. Otherwise the sources are ensured through the
//! fetcher, the payload is rebuilt, and the document replaces the old one
//! atomically while holding a cross-process lock on the output path.
//!
//! # Source format
//!
//! Every source is a JSON array of objects (or an object keyed by id whose
//! values are objects). Entries carry at least an integer `id`; name-bearing
//! kinds read `name`, accessor sources read `varp`, `lsb` and `msb` (also
//! accepted as `varp_id`/`index`, `start_bit`, `end_bit`).
//!
//! Object sources may also carry `actions` (up to five strings or nulls) and
//! `locations`, each a packed integer, `[x, y, plane]`, or
//! `{"x", "y", "plane"}`. An id listed more than once has its locations
//! merged.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::artifact::{
    ArtifactDocument, ArtifactId, ArtifactKind, ArtifactPayload, ArtifactSpec, BitAccessor,
    GeneratedArtifact, Provenance, VarbitDefinition,
};
use crate::descriptor::ResourceDescriptor;
use crate::fetch::ResourceFetcher;
use crate::fsio::{self, FileLock};
use crate::keyed::KeyedLocks;
use crate::objects::{Location, ObjectDefinition, ACTION_SLOTS, MAX_COORD};
use crate::paths::Category;
use crate::{GenerationError, ResourceError};

/// Version of the generation logic. Bump when output for the same inputs
/// changes; every artifact is then regenerated on next use.
pub const GENERATOR_VERSION: u32 = 2;

type Entry = Map<String, Value>;

// ---------------------------------------------------------------------------
// ArtifactGenerator
// ---------------------------------------------------------------------------

/// The only writer of the `generated/` subtree.
pub struct ArtifactGenerator {
    fetcher: Arc<ResourceFetcher>,
    version: u32,
    locks: KeyedLocks<ArtifactId>,
    generations: AtomicU64,
}

impl ArtifactGenerator {
    pub fn new(fetcher: Arc<ResourceFetcher>) -> Self {
        Self::with_version(fetcher, GENERATOR_VERSION)
    }

    /// A generator that stamps outputs with `version` instead of
    /// [`GENERATOR_VERSION`].
    pub fn with_version(fetcher: Arc<ResourceFetcher>, version: u32) -> Self {
        Self {
            fetcher,
            version,
            locks: KeyedLocks::new(),
            generations: AtomicU64::new(0),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn fetcher(&self) -> &Arc<ResourceFetcher> {
        &self.fetcher
    }

    /// Number of times an artifact was actually (re)built.
    pub fn generations(&self) -> u64 {
        self.generations.load(Ordering::Relaxed)
    }

    /// `generated/<id>.json`.
    pub fn output_path(&self, id: &ArtifactId) -> Result<PathBuf, ResourceError> {
        self.fetcher
            .root()
            .subpath(Category::Generated, &format!("{id}.json"))
    }

    /// `true` if the output exists and its provenance matches `spec`.
    pub fn is_current(&self, spec: &ArtifactSpec) -> Result<bool, ResourceError> {
        let path = self.output_path(&spec.id)?;
        Ok(read_provenance(&path).as_ref() == Some(&Provenance::expected(spec, self.version)))
    }

    /// Bring the artifact described by `spec` up to date.
    ///
    /// # Errors
    ///
    /// - [`ResourceError::Fetch`] if a source is missing locally and cannot
    ///   be downloaded.
    /// - [`ResourceError::Generation`] if a source is malformed. The previous
    ///   output, if any, is left untouched.
    pub fn generate(&self, spec: &ArtifactSpec) -> Result<GeneratedArtifact, ResourceError> {
        self.run(spec, false)
    }

    /// Re-download every source and rebuild the artifact even when its
    /// provenance is current.
    ///
    /// # Errors
    ///
    /// As [`generate`](Self::generate).
    pub fn regenerate(&self, spec: &ArtifactSpec) -> Result<GeneratedArtifact, ResourceError> {
        self.run(spec, true)
    }

    fn run(&self, spec: &ArtifactSpec, force: bool) -> Result<GeneratedArtifact, ResourceError> {
        let path = self.output_path(&spec.id)?;
        let expected = Provenance::expected(spec, self.version);

        if !force && read_provenance(&path).as_ref() == Some(&expected) {
            tracing::debug!(artifact = %spec.id, "artifact current");
            return Ok(self.result(spec, expected, path, false));
        }

        let slot = self.locks.slot(&spec.id);
        let _guard = slot.lock();
        let _file_lock = FileLock::acquire(&fsio::sidecar_path(&path, "lock"))?;

        if !force && read_provenance(&path).as_ref() == Some(&expected) {
            return Ok(self.result(spec, expected, path, false));
        }

        let mut sources = Vec::with_capacity(spec.sources.len());
        for descriptor in &spec.sources {
            let local = if force {
                self.fetcher.force_refresh(descriptor)?
            } else {
                self.fetcher.ensure(descriptor)?
            };
            let bytes = std::fs::read(&local.path).map_err(|e| ResourceError::io(&local.path, e))?;
            sources.push((descriptor, bytes));
        }
        let payload = build_payload(spec, &sources)?;

        let document = ArtifactDocument {
            provenance: expected.clone(),
            payload,
        };
        let mut bytes = serde_json::to_vec_pretty(&document).map_err(|e| GenerationError::Encoding {
            artifact: spec.id.to_string(),
            details: e.to_string(),
        })?;
        bytes.push(b'\n');
        fsio::atomic_write(&path, &bytes)?;

        self.generations.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            artifact = %spec.id,
            entries = document.payload.len(),
            generator_version = self.version,
            "artifact generated"
        );
        Ok(self.result(spec, expected, path, true))
    }

    fn result(
        &self,
        spec: &ArtifactSpec,
        provenance: Provenance,
        path: PathBuf,
        regenerated: bool,
    ) -> GeneratedArtifact {
        GeneratedArtifact {
            id: spec.id.clone(),
            generator_version: provenance.generator_version,
            source_fingerprints: provenance.source_fingerprints,
            path,
            regenerated,
        }
    }
}

#[derive(Deserialize)]
struct ProvenanceOnly {
    provenance: Provenance,
}

fn read_provenance(path: &Path) -> Option<Provenance> {
    let bytes = std::fs::read(path).ok()?;
    serde_json::from_slice::<ProvenanceOnly>(&bytes)
        .ok()
        .map(|p| p.provenance)
}

/// Parse a generated document. Used by the loader.
pub(crate) fn read_document(path: &Path, id: &ArtifactId) -> Result<ArtifactDocument, ResourceError> {
    let bytes = std::fs::read(path).map_err(|e| ResourceError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| {
        ResourceError::Generation(GenerationError::Encoding {
            artifact: id.to_string(),
            details: e.to_string(),
        })
    })
}

// ---------------------------------------------------------------------------
// Payload builders
// ---------------------------------------------------------------------------

fn build_payload(
    spec: &ArtifactSpec,
    sources: &[(&ResourceDescriptor, Vec<u8>)],
) -> Result<ArtifactPayload, GenerationError> {
    let mut entries = Vec::new();
    for (descriptor, bytes) in sources {
        let parsed = parse_entries(spec, descriptor, bytes)?;
        entries.extend(parsed.into_iter().map(|e| (*descriptor, e)));
    }

    match spec.kind {
        ArtifactKind::NameTable => {
            let mut table = BTreeMap::new();
            for (descriptor, entry) in &entries {
                let id = required_int(spec, descriptor, entry, &["id"])?;
                if let Some(name) = display_name(entry) {
                    table.insert(id, name.to_owned());
                }
            }
            Ok(ArtifactPayload::NameTable(table))
        }
        ArtifactKind::ConstantSet => {
            let mut named = Vec::new();
            for (descriptor, entry) in &entries {
                let id = required_int(spec, descriptor, entry, &["id"])?;
                if let Some(name) = display_name(entry) {
                    named.push((id, name));
                }
            }
            named.sort_by_key(|(id, _)| *id);
            let mut set = BTreeMap::new();
            for (id, name) in named {
                if let Some(key) = unique_key(&set, constant_name(name), id) {
                    set.insert(key, id);
                }
            }
            Ok(ArtifactPayload::ConstantSet(set))
        }
        ArtifactKind::AccessorSet => {
            let mut parsed = Vec::new();
            for (descriptor, entry) in &entries {
                let Some(name) = display_name(entry) else {
                    continue;
                };
                let id = int_field(entry, &["id"]).unwrap_or_default();
                let accessor = accessor(spec, descriptor, entry)?;
                parsed.push((id, name, accessor));
            }
            parsed.sort_by_key(|(id, _, _)| *id);
            let mut set = BTreeMap::new();
            for (id, name, accessor) in parsed {
                if let Some(key) = unique_key(&set, constant_name(name), id) {
                    set.insert(key, VarbitDefinition { id, accessor });
                }
            }
            Ok(ArtifactPayload::AccessorSet(set))
        }
        ArtifactKind::ObjectIndex => {
            let mut index: BTreeMap<i64, ObjectDefinition> = BTreeMap::new();
            for (descriptor, entry) in &entries {
                let id = required_int(spec, descriptor, entry, &["id"])?;
                let actions = parse_actions(spec, descriptor, entry)?;
                let locations = parse_locations(spec, descriptor, entry)?;
                let object = index.entry(id).or_default();
                if object.name.is_none() {
                    object.name = display_name(entry).map(str::to_owned);
                }
                if object.actions.is_empty() {
                    object.actions = actions;
                }
                object.locations.extend(locations);
            }
            for object in index.values_mut() {
                object.locations.sort_unstable();
                object.locations.dedup();
            }
            Ok(ArtifactPayload::ObjectIndex(index))
        }
    }
}

fn parse_entries(
    spec: &ArtifactSpec,
    descriptor: &ResourceDescriptor,
    bytes: &[u8],
) -> Result<Vec<Entry>, GenerationError> {
    let malformed = |details: String| GenerationError::Malformed {
        artifact: spec.id.to_string(),
        source_name: descriptor.name.clone(),
        details,
    };
    let value: Value = serde_json::from_slice(bytes).map_err(|e| malformed(e.to_string()))?;

    match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(map) => Ok(map),
                other => Err(malformed(format!("entry {i} is not an object: {other}"))),
            })
            .collect(),
        Value::Object(by_id) => by_id
            .into_iter()
            .map(|(key, item)| match item {
                Value::Object(mut map) => {
                    if !map.contains_key("id") {
                        let id: i64 = key
                            .parse()
                            .map_err(|_| malformed(format!("key '{key}' is not an integer id")))?;
                        map.insert("id".to_owned(), Value::from(id));
                    }
                    Ok(map)
                }
                other => Err(malformed(format!("entry '{key}' is not an object: {other}"))),
            })
            .collect(),
        other => Err(malformed(format!(
            "expected an array or object of entries, found {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn int_field(entry: &Entry, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|k| entry.get(*k).and_then(Value::as_i64))
}

fn required_int(
    spec: &ArtifactSpec,
    descriptor: &ResourceDescriptor,
    entry: &Entry,
    keys: &[&str],
) -> Result<i64, GenerationError> {
    int_field(entry, keys).ok_or_else(|| GenerationError::Malformed {
        artifact: spec.id.to_string(),
        source_name: descriptor.name.clone(),
        details: format!("entry is missing integer field '{}': {}", keys[0], Value::Object(entry.clone())),
    })
}

/// A usable name: present, non-empty, and not the literal `"null"` that the
/// game uses for unnamed definitions.
fn display_name(entry: &Entry) -> Option<&str> {
    entry
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty() && !n.eq_ignore_ascii_case("null"))
}

fn accessor(
    spec: &ArtifactSpec,
    descriptor: &ResourceDescriptor,
    entry: &Entry,
) -> Result<BitAccessor, GenerationError> {
    let varp = required_int(spec, descriptor, entry, &["varp", "varp_id", "index"])?;
    let lsb = required_int(spec, descriptor, entry, &["lsb", "start_bit"])?;
    let msb = required_int(spec, descriptor, entry, &["msb", "end_bit"])?;

    let in_range =
        (0..=i64::from(u32::MAX)).contains(&varp) && (0..=31).contains(&lsb) && (lsb..=31).contains(&msb);
    if !in_range {
        return Err(GenerationError::Malformed {
            artifact: spec.id.to_string(),
            source_name: descriptor.name.clone(),
            details: format!("invalid bit range varp={varp} lsb={lsb} msb={msb}"),
        });
    }
    Ok(BitAccessor {
        varp: varp as u32,
        lsb: lsb as u8,
        msb: msb as u8,
    })
}

/// `key`, or the first free of `key_<id>`, `key_<id>_2`, `key_<id>_3`, ...
/// `None` for empty keys.
fn unique_key<V>(taken: &BTreeMap<String, V>, key: String, id: i64) -> Option<String> {
    if key.is_empty() {
        return None;
    }
    if !taken.contains_key(&key) {
        return Some(key);
    }
    let base = format!("{key}_{id}");
    if !taken.contains_key(&base) {
        return Some(base);
    }
    (2u64..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !taken.contains_key(candidate))
}

fn parse_actions(
    spec: &ArtifactSpec,
    descriptor: &ResourceDescriptor,
    entry: &Entry,
) -> Result<Vec<Option<String>>, GenerationError> {
    let malformed = |details: String| GenerationError::Malformed {
        artifact: spec.id.to_string(),
        source_name: descriptor.name.clone(),
        details,
    };
    let raw = match entry.get("actions") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(raw)) => raw,
        Some(other) => return Err(malformed(format!("actions must be an array, found {other}"))),
    };
    if raw.len() > ACTION_SLOTS {
        return Err(malformed(format!("{} action slots, at most {ACTION_SLOTS} allowed", raw.len())));
    }
    let mut slots = vec![None; ACTION_SLOTS];
    for (slot, action) in raw.iter().enumerate() {
        slots[slot] = match action {
            Value::Null => None,
            Value::String(a) => Some(a.trim())
                .filter(|a| !a.is_empty() && !a.eq_ignore_ascii_case("null"))
                .map(str::to_owned),
            other => return Err(malformed(format!("action slot {slot} is not a string: {other}"))),
        };
    }
    Ok(slots)
}

fn parse_locations(
    spec: &ArtifactSpec,
    descriptor: &ResourceDescriptor,
    entry: &Entry,
) -> Result<Vec<Location>, GenerationError> {
    let malformed = |details: String| GenerationError::Malformed {
        artifact: spec.id.to_string(),
        source_name: descriptor.name.clone(),
        details,
    };
    let raw = match entry.get("locations") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(raw)) => raw,
        Some(other) => return Err(malformed(format!("locations must be an array, found {other}"))),
    };

    raw.iter()
        .map(|value| {
            let parts = match value {
                // Signed packing stores planes 2 and 3 as negative numbers.
                Value::Number(n) => match n.as_i64() {
                    Some(packed) if (i64::from(i32::MIN)..=i64::from(u32::MAX)).contains(&packed) => {
                        let loc = Location::unpack(packed as u32);
                        Some((i64::from(loc.x), i64::from(loc.y), i64::from(loc.plane)))
                    }
                    _ => None,
                },
                Value::Array(xyz) if xyz.len() == 3 => {
                    match (xyz[0].as_i64(), xyz[1].as_i64(), xyz[2].as_i64()) {
                        (Some(x), Some(y), Some(plane)) => Some((x, y, plane)),
                        _ => None,
                    }
                }
                Value::Object(map) => {
                    let plane = map.get("plane").map_or(Some(0), Value::as_i64);
                    match (map.get("x").and_then(Value::as_i64), map.get("y").and_then(Value::as_i64), plane) {
                        (Some(x), Some(y), Some(plane)) => Some((x, y, plane)),
                        _ => None,
                    }
                }
                _ => None,
            };
            let coord = 0..=i64::from(MAX_COORD);
            match parts {
                Some((x, y, plane)) if coord.contains(&x) && coord.contains(&y) && (0..=3).contains(&plane) => {
                    Ok(Location::new(x as i32, y as i32, plane as u8))
                }
                _ => Err(malformed(format!("invalid location {value}"))),
            }
        })
        .collect()
}

/// Turn a display name into an `UPPER_SNAKE` identifier.
///
/// Runs of non-alphanumeric characters become one `_`; a leading digit gets
/// a `_` prefix.
pub fn constant_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch.to_ascii_uppercase());
        } else {
            pending_sep = true;
        }
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Fingerprint;
    use crate::paths::CacheRoot;
    use crate::source::RemoteSource;
    use crate::FetchError;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemorySource {
        files: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl RemoteSource for MemorySource {
        fn fetch(&self, locator: &str, _fp: &Fingerprint) -> Result<Vec<u8>, FetchError> {
            self.files
                .lock()
                .get(locator)
                .cloned()
                .ok_or_else(|| FetchError::Status {
                    locator: locator.to_owned(),
                    status: 404,
                })
        }
    }

    fn setup(files: &[(&str, &str)]) -> (tempfile::TempDir, Arc<MemorySource>, Arc<ResourceFetcher>) {
        let tmp = tempfile::tempdir().unwrap();
        let root = CacheRoot::resolve(Some(tmp.path())).unwrap();
        let source = Arc::new(MemorySource::default());
        for (k, v) in files {
            source.files.lock().insert((*k).to_owned(), v.as_bytes().to_vec());
        }
        let fetcher = Arc::new(ResourceFetcher::new(root, Arc::clone(&source) as Arc<dyn RemoteSource>));
        (tmp, source, fetcher)
    }

    fn spec(id: &str, kind: ArtifactKind, source: &str, fp: &str) -> ArtifactSpec {
        ArtifactSpec::new(
            id,
            kind,
            vec![ResourceDescriptor::new(
                source,
                format!("remote/{source}.json"),
                format!("game_data/{source}.json"),
                Fingerprint::new(fp),
            )],
        )
    }

    fn payload_of(path: &Path) -> ArtifactPayload {
        read_document(path, &"x".into()).unwrap().payload
    }

    // -- 1. provenance gating -------------------------------------------------

    #[test]
    fn unchanged_inputs_skip_regeneration() {
        let (_tmp, _src, fetcher) = setup(&[("remote/items.json", r#"[{"id":1,"name":"Cabbage"}]"#)]);
        let generator = ArtifactGenerator::new(fetcher);
        let s = spec("items", ArtifactKind::NameTable, "items", "1");

        let first = generator.generate(&s).unwrap();
        assert!(first.regenerated);
        let bytes_before = std::fs::read(&first.path).unwrap();

        let second = generator.generate(&s).unwrap();
        assert!(!second.regenerated);
        assert_eq!(generator.generations(), 1);
        assert_eq!(std::fs::read(&second.path).unwrap(), bytes_before);
        assert!(generator.is_current(&s).unwrap());
    }

    #[test]
    fn fingerprint_or_version_change_regenerates() {
        let (_tmp, src, fetcher) = setup(&[("remote/items.json", r#"[{"id":1,"name":"Cabbage"}]"#)]);
        let generator = ArtifactGenerator::new(Arc::clone(&fetcher));
        generator.generate(&spec("items", ArtifactKind::NameTable, "items", "1")).unwrap();

        src.files
            .lock()
            .insert("remote/items.json".into(), br#"[{"id":1,"name":"Cabbage"},{"id":2,"name":"Onion"}]"#.to_vec());
        let s2 = spec("items", ArtifactKind::NameTable, "items", "2");
        assert!(!generator.is_current(&s2).unwrap());
        let out = generator.generate(&s2).unwrap();
        assert!(out.regenerated);
        assert_eq!(payload_of(&out.path).len(), 2);

        let bumped = ArtifactGenerator::with_version(fetcher, GENERATOR_VERSION + 1);
        assert!(bumped.generate(&s2).unwrap().regenerated);
    }

    #[test]
    fn regenerate_refetches_current_artifact() {
        let (_tmp, src, fetcher) = setup(&[("remote/items.json", r#"[{"id":1,"name":"Cabbage"}]"#)]);
        let generator = ArtifactGenerator::new(Arc::clone(&fetcher));
        let s = spec("items", ArtifactKind::NameTable, "items", "1");
        generator.generate(&s).unwrap();

        // Same fingerprint, different upstream bytes: only a forced run sees them.
        src.files
            .lock()
            .insert("remote/items.json".into(), br#"[{"id":1,"name":"Onion"}]"#.to_vec());
        assert!(!generator.generate(&s).unwrap().regenerated);

        let out = generator.regenerate(&s).unwrap();
        assert!(out.regenerated);
        assert_eq!(generator.generations(), 2);
        assert_eq!(fetcher.stats().transfers(), 2);
        match payload_of(&out.path) {
            ArtifactPayload::NameTable(t) => assert_eq!(t[&1], "Onion"),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn identical_inputs_produce_identical_bytes() {
        let data = r#"{"5":{"name":"Zulrah"},"2":{"name":"Man"},"9":{"name":"null"}}"#;
        let (_t1, _s1, f1) = setup(&[("remote/npcs.json", data)]);
        let (_t2, _s2, f2) = setup(&[("remote/npcs.json", data)]);
        let s = spec("npcs", ArtifactKind::NameTable, "npcs", "1");

        let a = ArtifactGenerator::new(f1).generate(&s).unwrap();
        let b = ArtifactGenerator::new(f2).generate(&s).unwrap();
        assert_eq!(std::fs::read(a.path).unwrap(), std::fs::read(&b.path).unwrap());
        match payload_of(&b.path) {
            ArtifactPayload::NameTable(t) => {
                assert_eq!(t.len(), 2);
                assert_eq!(t.get(&5).map(String::as_str), Some("Zulrah"));
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    // -- 2. payload kinds -----------------------------------------------------

    #[test]
    fn constant_set_sanitizes_and_disambiguates() {
        let varps = r#"[
            {"id": 300, "name": "quest points"},
            {"id": 101, "name": "Quest-Points"},
            {"id": 7,   "name": "2h mode"},
            {"id": 8,   "name": "  "}
        ]"#;
        let (_tmp, _src, fetcher) = setup(&[("remote/varps.json", varps)]);
        let out = ArtifactGenerator::new(fetcher)
            .generate(&spec("varps", ArtifactKind::ConstantSet, "varps", "1"))
            .unwrap();
        match payload_of(&out.path) {
            ArtifactPayload::ConstantSet(set) => {
                assert_eq!(set.get("QUEST_POINTS"), Some(&101));
                assert_eq!(set.get("QUEST_POINTS_300"), Some(&300));
                assert_eq!(set.get("_2H_MODE"), Some(&7));
                assert_eq!(set.len(), 3);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn disambiguated_names_never_overwrite_each_other() {
        let varps = r#"[
            {"id": 1, "name": "x"},
            {"id": 2, "name": "x 3"},
            {"id": 3, "name": "x"},
            {"id": 4, "name": "x_3"}
        ]"#;
        let (_tmp, _src, fetcher) = setup(&[("remote/varps.json", varps)]);
        let out = ArtifactGenerator::new(fetcher)
            .generate(&spec("varps", ArtifactKind::ConstantSet, "varps", "1"))
            .unwrap();
        match payload_of(&out.path) {
            ArtifactPayload::ConstantSet(set) => {
                assert_eq!(set.get("X"), Some(&1));
                assert_eq!(set.get("X_3"), Some(&2));
                assert_eq!(set.get("X_3_2"), Some(&3));
                assert_eq!(set.get("X_3_4"), Some(&4));
                assert_eq!(set.len(), 4);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn object_index_merges_rows_and_reads_every_location_form() {
        let packed = Location::new(3200, 3201, 2).pack();
        let signed = packed as i32;
        let objects = format!(
            r#"[
                {{"id": 1276, "name": "Tree", "actions": ["Chop down", null, "null"],
                  "locations": [[3222, 3218, 0], {{"x": 3223, "y": 3218}}]}},
                {{"id": 1276, "locations": [{packed}, [3222, 3218, 0]]}},
                {{"id": 10356, "name": "null", "locations": [{signed}]}}
            ]"#
        );
        let (_tmp, _src, fetcher) = setup(&[("remote/objects.json", objects.as_str())]);
        let out = ArtifactGenerator::new(fetcher)
            .generate(&spec("objects", ArtifactKind::ObjectIndex, "objects", "1"))
            .unwrap();
        match payload_of(&out.path) {
            ArtifactPayload::ObjectIndex(index) => {
                let tree = &index[&1276];
                assert_eq!(tree.name.as_deref(), Some("Tree"));
                assert_eq!(
                    tree.actions,
                    vec![Some("Chop down".to_owned()), None, None, None, None]
                );
                assert_eq!(
                    tree.locations,
                    vec![
                        Location::new(3200, 3201, 2),
                        Location::new(3222, 3218, 0),
                        Location::new(3223, 3218, 0),
                    ]
                );
                let booth = &index[&10356];
                assert_eq!(booth.name, None);
                assert_eq!(booth.locations, vec![Location::new(3200, 3201, 2)]);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn object_with_bad_location_is_malformed() {
        for bad in [
            r#"[{"id": 1, "locations": [[1, 2]]}]"#,
            r#"[{"id": 1, "locations": [{"x": 40000, "y": 1}]}]"#,
            r#"[{"id": 1, "actions": ["a", "b", "c", "d", "e", "f"]}]"#,
        ] {
            let (_tmp, _src, fetcher) = setup(&[("remote/objects.json", bad)]);
            let err = ArtifactGenerator::new(fetcher)
                .generate(&spec("objects", ArtifactKind::ObjectIndex, "objects", "1"))
                .unwrap_err();
            assert!(
                matches!(err, ResourceError::Generation(GenerationError::Malformed { .. })),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn accessor_set_accepts_field_aliases() {
        let varbits = r#"[
            {"id": 4070, "name": "spellbook", "varp": 439, "lsb": 0, "msb": 1},
            {"id": 357, "name": "weapon type", "varp_id": 843, "start_bit": 0, "end_bit": 5}
        ]"#;
        let (_tmp, _src, fetcher) = setup(&[("remote/varbits.json", varbits)]);
        let out = ArtifactGenerator::new(fetcher)
            .generate(&spec("varbits", ArtifactKind::AccessorSet, "varbits", "1"))
            .unwrap();
        match payload_of(&out.path) {
            ArtifactPayload::AccessorSet(set) => {
                assert_eq!(set["SPELLBOOK"].accessor, BitAccessor { varp: 439, lsb: 0, msb: 1 });
                assert_eq!(set["SPELLBOOK"].id, 4070);
                assert_eq!(set["WEAPON_TYPE"].accessor, BitAccessor { varp: 843, lsb: 0, msb: 5 });
                assert_eq!(set["WEAPON_TYPE"].id, 357);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    // -- 3. malformed sources -------------------------------------------------

    #[test]
    fn malformed_sources_fail_without_touching_output() {
        let (_tmp, src, fetcher) = setup(&[("remote/items.json", r#"[{"id":1,"name":"Cabbage"}]"#)]);
        let generator = ArtifactGenerator::new(fetcher);
        let good = generator
            .generate(&spec("items", ArtifactKind::NameTable, "items", "1"))
            .unwrap();
        let before = std::fs::read(&good.path).unwrap();

        for bad in [r#"{"not":"entries"}"#, r#"[{"name":"no id"}]"#, "not json", "42"] {
            src.files.lock().insert("remote/items.json".into(), bad.as_bytes().to_vec());
            let fp = format!("bad-{}", bad.len());
            let err = generator
                .generate(&spec("items", ArtifactKind::NameTable, "items", &fp))
                .unwrap_err();
            assert!(
                matches!(err, ResourceError::Generation(GenerationError::Malformed { .. })),
                "{bad}: {err}"
            );
        }
        assert_eq!(std::fs::read(&good.path).unwrap(), before);
    }

    #[test]
    fn accessor_with_bad_range_is_malformed() {
        let varbits = r#"[{"id": 1, "name": "x", "varp": 1, "lsb": 5, "msb": 2}]"#;
        let (_tmp, _src, fetcher) = setup(&[("remote/varbits.json", varbits)]);
        let err = ArtifactGenerator::new(fetcher)
            .generate(&spec("varbits", ArtifactKind::AccessorSet, "varbits", "1"))
            .unwrap_err();
        assert!(matches!(err, ResourceError::Generation(GenerationError::Malformed { .. })));
    }

    #[test]
    fn missing_source_surfaces_fetch_error() {
        let (_tmp, _src, fetcher) = setup(&[]);
        let err = ArtifactGenerator::new(fetcher)
            .generate(&spec("items", ArtifactKind::NameTable, "items", "1"))
            .unwrap_err();
        assert!(matches!(err, ResourceError::Fetch(_)));
    }

    #[test]
    fn constant_name_rules() {
        assert_eq!(constant_name("Quest points"), "QUEST_POINTS");
        assert_eq!(constant_name("--a--b--"), "A_B");
        assert_eq!(constant_name("3rd age"), "_3RD_AGE");
        assert_eq!(constant_name("!!"), "");
    }
}
