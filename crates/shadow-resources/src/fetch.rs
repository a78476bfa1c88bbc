//! Idempotent download of remote resources into the `data/` subtree.
//!
//! [`ResourceFetcher::ensure`] makes a descriptor's content available
//! locally. A copy whose recorded fingerprint matches the descriptor is
//! returned without any network access. Otherwise the fetcher serializes on
//! the local path (in-process [`KeyedLocks`] first, then a cross-process
//! [`FileLock`]), re-checks, downloads, verifies, decompresses, and publishes
//! the file with an atomic rename before recording the new fingerprint in a
//! `.fingerprint` sidecar.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use shadow_resources::prelude::*;
//!
//! # fn source() -> Arc<dyn RemoteSource> { unimplemented!() }
//! let root = CacheRoot::resolve(None).unwrap();
//! let fetcher = ResourceFetcher::new(root, source());
//! let items = ResourceDescriptor::new(
//!     "items",
//!     "game_data/latest/items.json",
//!     "game_data/items.json",
//!     Fingerprint::new("231"),
//! );
//! fetcher.ensure(&items).unwrap();
//! let again = fetcher.ensure(&items).unwrap();
//! assert_eq!(again.transferred_bytes, 0);
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use flate2::read::GzDecoder;

use crate::descriptor::{Compression, Fingerprint, ResourceDescriptor};
use crate::fsio::{self, FileLock};
use crate::keyed::KeyedLocks;
use crate::paths::{CacheRoot, Category};
use crate::source::RemoteSource;
use crate::{FetchError, ResourceError};

const FINGERPRINT_SUFFIX: &str = "fingerprint";
const LOCK_SUFFIX: &str = "lock";

// ---------------------------------------------------------------------------
// LocalResource / FetchStats
// ---------------------------------------------------------------------------

/// A resource that is present on disk with the requested fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalResource {
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
    /// `true` if this call performed the download.
    pub downloaded: bool,
    /// Bytes received from the remote by this call (0 on a cache hit).
    pub transferred_bytes: u64,
}

/// Counters describing fetcher activity since construction.
#[derive(Debug, Default)]
pub struct FetchStats {
    transfers: AtomicU64,
    bytes: AtomicU64,
    cache_hits: AtomicU64,
    volatile_reads: AtomicU64,
}

impl FetchStats {
    /// Completed descriptor downloads. Volatile reads are not counted.
    pub fn transfers(&self) -> u64 {
        self.transfers.load(Ordering::Relaxed)
    }

    /// Total bytes received, volatile reads included.
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// `ensure` calls satisfied by an existing copy.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Completed [`fetch_volatile`](ResourceFetcher::fetch_volatile) calls.
    pub fn volatile_reads(&self) -> u64 {
        self.volatile_reads.load(Ordering::Relaxed)
    }

    fn record_volatile_read(&self, bytes: u64) {
        self.volatile_reads.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn record_transfer(&self, bytes: u64) {
        self.transfers.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// ResourceFetcher
// ---------------------------------------------------------------------------

/// The only writer of the `data/` subtree.
pub struct ResourceFetcher {
    root: CacheRoot,
    source: Arc<dyn RemoteSource>,
    locks: KeyedLocks<PathBuf>,
    stats: FetchStats,
}

impl ResourceFetcher {
    pub fn new(root: CacheRoot, source: Arc<dyn RemoteSource>) -> Self {
        Self {
            root,
            source,
            locks: KeyedLocks::new(),
            stats: FetchStats::default(),
        }
    }

    pub fn root(&self) -> &CacheRoot {
        &self.root
    }

    pub fn stats(&self) -> &FetchStats {
        &self.stats
    }

    /// Make `descriptor` available locally, downloading at most once.
    ///
    /// Concurrent calls for the same local path (from threads or other
    /// processes sharing the cache root) perform a single transfer; late
    /// arrivals wait on the lock and then find the fresh copy.
    ///
    /// # Errors
    ///
    /// - [`ResourceError::Fetch`] if the transfer, checksum or decompression
    ///   fails. The previous copy, if any, is left untouched and the error is
    ///   returned rather than retried.
    /// - [`ResourceError::Io`] / [`ResourceError::InvalidPath`] for local
    ///   filesystem problems.
    pub fn ensure(&self, descriptor: &ResourceDescriptor) -> Result<LocalResource, ResourceError> {
        let path = self.root.subpath(Category::Data, &descriptor.local_path)?;
        if let Some(hit) = self.cache_hit(&path, descriptor) {
            return Ok(hit);
        }

        let slot = self.locks.slot(&path);
        let _guard = slot.lock();
        let _file_lock = FileLock::acquire(&fsio::sidecar_path(&path, LOCK_SUFFIX))?;

        // Someone else may have finished the download while we waited.
        if let Some(hit) = self.cache_hit(&path, descriptor) {
            return Ok(hit);
        }
        self.download(descriptor, path)
    }

    /// Download `descriptor` even if a matching copy exists, for copies
    /// suspected to be corrupt.
    ///
    /// # Errors
    ///
    /// As [`ensure`](Self::ensure). On failure the existing copy is kept.
    pub fn force_refresh(&self, descriptor: &ResourceDescriptor) -> Result<LocalResource, ResourceError> {
        let path = self.root.subpath(Category::Data, &descriptor.local_path)?;
        let slot = self.locks.slot(&path);
        let _guard = slot.lock();
        let _file_lock = FileLock::acquire(&fsio::sidecar_path(&path, LOCK_SUFFIX))?;
        tracing::info!(resource = %descriptor.name, "forcing fresh download");
        self.download(descriptor, path)
    }

    /// Transfer, verify and publish. Callers hold both locks for `path`.
    fn download(&self, descriptor: &ResourceDescriptor, path: PathBuf) -> Result<LocalResource, ResourceError> {
        let bytes = self.source.fetch(&descriptor.locator, &descriptor.fingerprint)?;
        let transferred = bytes.len() as u64;
        verify_checksum(descriptor, &bytes)?;
        let payload = decode(descriptor, bytes)?;

        // Drop the old fingerprint first so an interrupted write is seen as stale.
        let sidecar = fsio::sidecar_path(&path, FINGERPRINT_SUFFIX);
        fsio::remove_if_present(&sidecar)?;
        fsio::atomic_write(&path, &payload)?;
        fsio::atomic_write(&sidecar, descriptor.fingerprint.as_str().as_bytes())?;

        self.stats.record_transfer(transferred);
        tracing::info!(
            resource = %descriptor.name,
            fingerprint = %descriptor.fingerprint,
            bytes = transferred,
            "resource downloaded"
        );
        Ok(LocalResource {
            path,
            fingerprint: descriptor.fingerprint.clone(),
            downloaded: true,
            transferred_bytes: transferred,
        })
    }

    /// `true` if the local copy exists and matches the descriptor's
    /// fingerprint. Never touches the network.
    pub fn is_current(&self, descriptor: &ResourceDescriptor) -> Result<bool, ResourceError> {
        let path = self.root.subpath(Category::Data, &descriptor.local_path)?;
        Ok(recorded_fingerprint(&path).as_ref() == Some(&descriptor.fingerprint))
    }

    /// A local copy with a different (or unknown) fingerprint, for callers
    /// that prefer stale data over none after a failed fetch.
    pub fn stale_copy(&self, descriptor: &ResourceDescriptor) -> Option<PathBuf> {
        let path = self
            .root
            .subpath(Category::Data, &descriptor.local_path)
            .ok()?;
        let current = recorded_fingerprint(&path).as_ref() == Some(&descriptor.fingerprint);
        (path.is_file() && !current).then_some(path)
    }

    /// Fetch bytes that must never be served from the local cache (revision
    /// metadata). A time-based fingerprint defeats remote caches.
    pub fn fetch_volatile(&self, locator: &str) -> Result<Vec<u8>, ResourceError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let bytes = self.source.fetch(locator, &Fingerprint::new(now.to_string()))?;
        self.stats.record_volatile_read(bytes.len() as u64);
        Ok(bytes)
    }

    /// Record a small value (such as the last known remote revision) under
    /// `data/`.
    pub fn pin(&self, name: &str, value: &str) -> Result<(), ResourceError> {
        let path = self.root.subpath(Category::Data, name)?;
        fsio::atomic_write(&path, value.as_bytes())
    }

    /// Read a value previously stored with [`pin`](Self::pin).
    pub fn pinned(&self, name: &str) -> Option<String> {
        let path = self.root.subpath(Category::Data, name).ok()?;
        fsio::read_trimmed(&path).filter(|v| !v.is_empty())
    }

    fn cache_hit(&self, path: &Path, descriptor: &ResourceDescriptor) -> Option<LocalResource> {
        if recorded_fingerprint(path).as_ref() != Some(&descriptor.fingerprint) {
            return None;
        }
        self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(resource = %descriptor.name, fingerprint = %descriptor.fingerprint, "resource cache hit");
        Some(LocalResource {
            path: path.to_path_buf(),
            fingerprint: descriptor.fingerprint.clone(),
            downloaded: false,
            transferred_bytes: 0,
        })
    }
}

/// The fingerprint recorded next to `path`, if the data file also exists.
fn recorded_fingerprint(path: &Path) -> Option<Fingerprint> {
    if !path.is_file() {
        return None;
    }
    fsio::read_trimmed(&fsio::sidecar_path(path, FINGERPRINT_SUFFIX))
        .filter(|v| !v.is_empty())
        .map(Fingerprint::new)
}

fn verify_checksum(descriptor: &ResourceDescriptor, bytes: &[u8]) -> Result<(), FetchError> {
    let Some(expected) = &descriptor.checksum else {
        return Ok(());
    };
    let actual = blake3::hash(bytes).to_hex().to_string();
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(FetchError::IntegrityMismatch {
            name: descriptor.name.clone(),
            expected: expected.clone(),
            actual,
        })
    }
}

fn decode(descriptor: &ResourceDescriptor, bytes: Vec<u8>) -> Result<Vec<u8>, FetchError> {
    match descriptor.compression {
        Compression::None => Ok(bytes),
        Compression::Gzip => {
            let mut out = Vec::new();
            GzDecoder::new(bytes.as_slice())
                .read_to_end(&mut out)
                .map_err(|e| FetchError::Decompress {
                    name: descriptor.name.clone(),
                    details: e.to_string(),
                })?;
            Ok(out)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
