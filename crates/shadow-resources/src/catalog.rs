//! The standard game-data resources and the artifacts derived from them.
//!
//! All game data is published together under one remote revision. The
//! revision is read from `metadata.json` (`cache_id`, falling back to
//! `revision`) and becomes the fingerprint of every descriptor, so a new
//! upstream revision invalidates the whole set at once.

use serde_json::Value;

use crate::artifact::{ArtifactKind, ArtifactSpec};
use crate::descriptor::{Compression, Fingerprint, ResourceDescriptor};
use crate::fetch::ResourceFetcher;
use crate::ResourceError;

/// Public bucket the game data is published to.
pub const DEFAULT_REMOTE_BASE: &str = "https://storage.googleapis.com/osrs-chroma-storage-eu";

/// Remote prefix of the current game-data revision.
pub const REMOTE_PREFIX: &str = "game_data/latest";

/// Local directory under `data/`.
pub const LOCAL_DIR: &str = "game_data";

/// Where the last successfully read revision is pinned under `data/`.
pub const PINNED_REVISION: &str = "game_data/revision";

pub const ITEMS: &str = "items";
pub const OBJECTS: &str = "objects";
pub const NPCS: &str = "npcs";
pub const INTERFACES: &str = "interfaces";
pub const VARPS: &str = "varps";
pub const VARBITS: &str = "varbits";

/// Extract the revision from a `metadata.json` document.
pub fn parse_revision(bytes: &[u8]) -> Result<Fingerprint, ResourceError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| ResourceError::Metadata {
        details: e.to_string(),
    })?;
    ["cache_id", "revision"]
        .iter()
        .find_map(|key| match value.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(Fingerprint::new(s.trim())),
            Some(Value::Number(n)) => Some(Fingerprint::new(n.to_string())),
            _ => None,
        })
        .ok_or_else(|| ResourceError::Metadata {
            details: "neither 'cache_id' nor 'revision' is present".to_owned(),
        })
}

/// Determine the current remote revision.
///
/// On success the revision is pinned locally. If the remote cannot be
/// reached, the pinned revision (if any) is returned with a warning so an
/// offline process keeps using its existing cache.
pub fn resolve_revision(fetcher: &ResourceFetcher) -> Result<Fingerprint, ResourceError> {
    let fetched = fetcher
        .fetch_volatile(&format!("{REMOTE_PREFIX}/metadata.json"))
        .and_then(|bytes| parse_revision(&bytes));

    match fetched {
        Ok(revision) => {
            if fetcher.pinned(PINNED_REVISION).as_deref() != Some(revision.as_str()) {
                fetcher.pin(PINNED_REVISION, revision.as_str())?;
                tracing::info!(revision = %revision, "remote game data revision");
            }
            Ok(revision)
        }
        Err(err) => match fetcher.pinned(PINNED_REVISION) {
            Some(pinned) => {
                tracing::warn!(error = %err, revision = %pinned, "remote revision unavailable, using pinned revision");
                Ok(Fingerprint::new(pinned))
            }
            None => Err(err),
        },
    }
}

fn descriptor(name: &str, remote_file: &str, local_file: &str, revision: &Fingerprint) -> ResourceDescriptor {
    ResourceDescriptor::new(
        name,
        format!("{REMOTE_PREFIX}/{remote_file}"),
        format!("{LOCAL_DIR}/{local_file}"),
        revision.clone(),
    )
}

/// Descriptors for every raw game-data file at `revision`.
pub fn game_data_descriptors(revision: &Fingerprint) -> Vec<ResourceDescriptor> {
    vec![
        descriptor(ITEMS, "items.json", "items.json", revision),
        descriptor(OBJECTS, "objects.json.gz", "objects.json", revision)
            .with_compression(Compression::Gzip),
        descriptor(NPCS, "npcs.json", "npcs.json", revision),
        descriptor(INTERFACES, "interfaces.json", "interfaces.json", revision),
        descriptor(VARPS, "varps.json", "varps.json", revision),
        descriptor(VARBITS, "varbits.json", "varbits.json", revision),
    ]
}

/// One artifact per raw file: three name tables, the object index, the varp
/// constants and the varbit accessors.
pub fn standard_artifacts(revision: &Fingerprint) -> Vec<ArtifactSpec> {
    game_data_descriptors(revision)
        .into_iter()
        .map(|d| {
            let kind = match d.name.as_str() {
                VARPS => ArtifactKind::ConstantSet,
                VARBITS => ArtifactKind::AccessorSet,
                OBJECTS => ArtifactKind::ObjectIndex,
                _ => ArtifactKind::NameTable,
            };
            ArtifactSpec::new(d.name.clone(), kind, vec![d])
        })
        .collect()
}
