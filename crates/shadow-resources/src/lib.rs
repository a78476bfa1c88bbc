//! Shadow Resources -- on-disk cache, remote game-data fetching, and derived
//! artifacts.
//!
//! This crate owns everything the library keeps on disk. Raw game data is
//! downloaded once per fingerprint into the `data/` subtree, derived lookup
//! tables are generated from it into the `generated/` subtree, and the loader
//! hands those tables to the rest of the process.
//!
//! # Architecture
//!
//! - **[`CacheRoot`](paths::CacheRoot)**: resolves and creates the versioned
//!   cache directory tree.
//! - **[`ResourceFetcher`](fetch::ResourceFetcher)**: idempotent download of
//!   [`ResourceDescriptor`](descriptor::ResourceDescriptor)s with per-key and
//!   cross-process locking.
//! - **[`ArtifactGenerator`](generate::ArtifactGenerator)**: turns raw
//!   resources into deterministic, provenance-stamped artifacts.
//! - **[`DynamicLoader`](loader::DynamicLoader)**: memoized, generate-on-demand
//!   access to artifacts, plus the [`GameConstants`](constants::GameConstants)
//!   bundle consumed by the event cache.
//! - **[`ObjectIndex`](objects::ObjectIndex)**: object definitions with a
//!   spatial index for nearby-object lookups.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use shadow_resources::prelude::*;
//!
//! let root = CacheRoot::resolve(None).unwrap();
//! let source = HttpSource::new(catalog::DEFAULT_REMOTE_BASE, std::time::Duration::from_secs(30)).unwrap();
//! let fetcher = Arc::new(ResourceFetcher::new(root, Arc::new(source)));
//! let revision = catalog::resolve_revision(&fetcher).unwrap();
//! let generator = Arc::new(ArtifactGenerator::new(Arc::clone(&fetcher)));
//! let loader = DynamicLoader::new(generator, catalog::standard_artifacts(&revision));
//! let constants = loader.load_constants().unwrap();
//! println!("{} items known", constants.item_count());
//! ```

#![deny(unsafe_code)]

pub mod artifact;
pub mod catalog;
pub mod constants;
pub mod descriptor;
pub mod fetch;
pub mod fsio;
pub mod generate;
pub mod keyed;
pub mod loader;
pub mod objects;
pub mod paths;
pub mod source;

use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by cache, fetch, generation, and load operations.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    /// The cache root (or one of its subtrees) could not be created or read.
    /// This is the only fatal condition at startup.
    #[error("cache directory {path} is unavailable: {source}")]
    CacheUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A name passed to [`CacheRoot::subpath`](paths::CacheRoot::subpath)
    /// would escape its category directory.
    #[error("invalid cache path '{name}': names must be relative and must not contain '..'")]
    InvalidPath { name: String },

    /// A filesystem operation inside the cache tree failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Downloading a remote resource failed. Never retried implicitly.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Source data could not be turned into an artifact.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// The remote revision metadata was missing or unreadable.
    #[error("remote metadata is invalid: {details}")]
    Metadata { details: String },

    /// An artifact id was requested that no registered `ArtifactSpec` describes.
    #[error("unknown artifact '{id}'. Registered artifacts: [{registered}]")]
    UnknownArtifact { id: String, registered: String },
}

impl ResourceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors produced while transferring a remote resource.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read.
    #[error("transport error fetching '{locator}': {details}")]
    Transport { locator: String, details: String },

    /// The remote answered with a non-success status.
    #[error("remote returned status {status} for '{locator}'")]
    Status { locator: String, status: u16 },

    /// The downloaded bytes do not hash to the descriptor's checksum.
    #[error("integrity check failed for '{name}': expected {expected}, got {actual}")]
    IntegrityMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// A compressed payload could not be decompressed.
    #[error("failed to decompress '{name}': {details}")]
    Decompress { name: String, details: String },
}

/// Errors produced while deriving an artifact from source data.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Source data does not have the expected shape.
    #[error("malformed source '{source_name}' for artifact '{artifact}': {details}")]
    Malformed {
        artifact: String,
        source_name: String,
        details: String,
    },

    /// The generated document could not be encoded or decoded.
    #[error("artifact '{artifact}' could not be encoded: {details}")]
    Encoding { artifact: String, details: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::artifact::{
        ArtifactId, ArtifactKind, ArtifactPayload, ArtifactSpec, BitAccessor, GeneratedArtifact,
        Provenance, VarbitDefinition,
    };
    pub use crate::catalog;
    pub use crate::constants::{GameConstants, NameTable};
    pub use crate::descriptor::{Compression, Fingerprint, ResourceDescriptor};
    pub use crate::fetch::{FetchStats, LocalResource, ResourceFetcher};
    pub use crate::generate::{ArtifactGenerator, GENERATOR_VERSION};
    pub use crate::loader::{DynamicLoader, LoadedArtifact};
    pub use crate::objects::{Location, NameMatch, NearbyObject, ObjectDefinition, ObjectIndex};
    pub use crate::paths::{CacheRoot, Category};
    pub use crate::source::{HttpSource, RemoteSource};
    pub use crate::{FetchError, GenerationError, ResourceError};
}
