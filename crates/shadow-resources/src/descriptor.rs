//! Remote resource descriptors and their fingerprints.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque version marker of a remote resource (a revision number, a content
/// hash, or similar). Two equal fingerprints mean the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// How the remote bytes are encoded. Compressed resources are stored
/// decompressed on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

/// Everything needed to fetch one remote resource into the `data/` subtree.
///
/// Descriptors are value types: two descriptors with the same `local_path`
/// and `fingerprint` denote the same on-disk copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Human-readable name used in logs and errors.
    pub name: String,
    /// Remote location, absolute URL or relative to the source's base URL.
    pub locator: String,
    /// Path relative to `data/`.
    pub local_path: String,
    /// Version of the remote content this descriptor expects.
    pub fingerprint: Fingerprint,
    /// Optional BLAKE3 hex digest of the remote (still compressed) bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default)]
    pub compression: Compression,
}

impl ResourceDescriptor {
    pub fn new(
        name: impl Into<String>,
        locator: impl Into<String>,
        local_path: impl Into<String>,
        fingerprint: Fingerprint,
    ) -> Self {
        Self {
            name: name.into(),
            locator: locator.into(),
            local_path: local_path.into(),
            fingerprint,
            checksum: None,
            compression: Compression::None,
        }
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }
}
