//! Memoized, generate-on-demand access to artifacts.
//!
//! [`DynamicLoader::load`] is the import boundary between generated code and
//! its consumers. The first load of an id runs the generator (a provenance
//! check when the artifact is already current), parses the document, and
//! memoizes it for the life of the process. Later loads return the same
//! [`Arc`]. Concurrent first loads of one id serialize on a per-id lock, so
//! generation runs once.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::artifact::{ArtifactId, ArtifactPayload, ArtifactSpec, Provenance};
use crate::catalog;
use crate::constants::{GameConstants, NameTable};
use crate::generate::{self, ArtifactGenerator};
use crate::keyed::KeyedLocks;
use crate::ResourceError;

/// A parsed, current artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedArtifact {
    pub provenance: Provenance,
    pub payload: ArtifactPayload,
    pub path: PathBuf,
}

pub struct DynamicLoader {
    generator: Arc<ArtifactGenerator>,
    specs: HashMap<ArtifactId, ArtifactSpec>,
    memo: RwLock<HashMap<ArtifactId, Arc<LoadedArtifact>>>,
    init_locks: KeyedLocks<ArtifactId>,
}

impl DynamicLoader {
    pub fn new(generator: Arc<ArtifactGenerator>, specs: impl IntoIterator<Item = ArtifactSpec>) -> Self {
        Self {
            generator,
            specs: specs.into_iter().map(|s| (s.id.clone(), s)).collect(),
            memo: RwLock::new(HashMap::new()),
            init_locks: KeyedLocks::new(),
        }
    }

    pub fn generator(&self) -> &Arc<ArtifactGenerator> {
        &self.generator
    }

    pub fn spec(&self, id: &ArtifactId) -> Option<&ArtifactSpec> {
        self.specs.get(id)
    }

    /// Load `id`, generating it first if needed.
    ///
    /// # Errors
    ///
    /// [`ResourceError::UnknownArtifact`] for unregistered ids, otherwise
    /// whatever generation reports.
    pub fn load(&self, id: &ArtifactId) -> Result<Arc<LoadedArtifact>, ResourceError> {
        if let Some(hit) = self.memo.read().get(id) {
            return Ok(Arc::clone(hit));
        }

        let slot = self.init_locks.slot(id);
        let _guard = slot.lock();
        if let Some(hit) = self.memo.read().get(id) {
            return Ok(Arc::clone(hit));
        }

        let spec = self.specs.get(id).ok_or_else(|| self.unknown(id))?;
        let generated = self.generator.generate(spec)?;
        let document = generate::read_document(&generated.path, id)?;
        let loaded = Arc::new(LoadedArtifact {
            provenance: document.provenance,
            payload: document.payload,
            path: generated.path,
        });
        self.memo.write().insert(id.clone(), Arc::clone(&loaded));
        tracing::debug!(artifact = %id, entries = loaded.payload.len(), "artifact loaded");
        Ok(loaded)
    }

    /// Drop the memoized copy of `id` and load it again.
    pub fn reload(&self, id: &ArtifactId) -> Result<Arc<LoadedArtifact>, ResourceError> {
        {
            let slot = self.init_locks.slot(id);
            let _guard = slot.lock();
            self.memo.write().remove(id);
        }
        self.load(id)
    }

    /// Re-download the sources of `id`, rebuild it, and replace the memoized
    /// copy. Callers holding the previous [`Arc`] keep their copy.
    ///
    /// # Errors
    ///
    /// [`ResourceError::UnknownArtifact`] for unregistered ids, otherwise
    /// whatever fetching or generation reports. The memo is left untouched
    /// on failure.
    pub fn force_update(&self, id: &ArtifactId) -> Result<Arc<LoadedArtifact>, ResourceError> {
        let spec = self.specs.get(id).ok_or_else(|| self.unknown(id))?;
        let slot = self.init_locks.slot(id);
        let _guard = slot.lock();

        let generated = self.generator.regenerate(spec)?;
        let document = generate::read_document(&generated.path, id)?;
        let loaded = Arc::new(LoadedArtifact {
            provenance: document.provenance,
            payload: document.payload,
            path: generated.path,
        });
        self.memo.write().insert(id.clone(), Arc::clone(&loaded));
        tracing::info!(artifact = %id, entries = loaded.payload.len(), "artifact force-updated");
        Ok(loaded)
    }

    /// `true` if the artifact exists on disk with current provenance.
    pub fn is_generated(&self, id: &ArtifactId) -> bool {
        self.specs
            .get(id)
            .is_some_and(|spec| self.generator.is_current(spec).unwrap_or(false))
    }

    pub fn is_loaded(&self, id: &ArtifactId) -> bool {
        self.memo.read().contains_key(id)
    }

    /// Load every registered standard artifact into one [`GameConstants`].
    ///
    /// Standard ids that are not registered are left empty. Fails on the
    /// first artifact that cannot be loaded.
    pub fn load_constants(&self) -> Result<GameConstants, ResourceError> {
        let (constants, mut failures) = self.assemble_constants(true);
        match failures.pop() {
            Some((_, err)) => Err(err),
            None => Ok(constants),
        }
    }

    /// Like [`load_constants`](Self::load_constants) but skips artifacts
    /// that fail, returning them alongside whatever could be loaded.
    pub fn load_available_constants(&self) -> (GameConstants, Vec<(ArtifactId, ResourceError)>) {
        self.assemble_constants(false)
    }

    fn assemble_constants(&self, stop_on_error: bool) -> (GameConstants, Vec<(ArtifactId, ResourceError)>) {
        let mut constants = GameConstants::new();
        let mut failures = Vec::new();
        let parts = [
            catalog::ITEMS,
            catalog::OBJECTS,
            catalog::NPCS,
            catalog::INTERFACES,
            catalog::VARPS,
            catalog::VARBITS,
        ];
        for id in parts {
            let loaded = match self.load_registered(id) {
                Ok(Some(loaded)) => loaded,
                Ok(None) => continue,
                Err(err) => {
                    failures.push((ArtifactId::new(id), err));
                    if stop_on_error {
                        break;
                    }
                    continue;
                }
            };
            let payload = &loaded.payload;
            constants = match id {
                catalog::ITEMS => constants.with_names(NameTable::Items, payload),
                catalog::OBJECTS => constants.with_objects(payload),
                catalog::NPCS => constants.with_names(NameTable::Npcs, payload),
                catalog::INTERFACES => constants.with_names(NameTable::Interfaces, payload),
                catalog::VARPS => constants.with_varps(payload),
                _ => constants.with_varbits(payload),
            };
        }
        (constants, failures)
    }

    fn load_registered(&self, id: &str) -> Result<Option<Arc<LoadedArtifact>>, ResourceError> {
        let id = ArtifactId::new(id);
        if self.specs.contains_key(&id) {
            self.load(&id).map(Some)
        } else {
            Ok(None)
        }
    }

    fn unknown(&self, id: &ArtifactId) -> ResourceError {
        let mut registered: Vec<_> = self.specs.keys().map(ArtifactId::as_str).collect();
        registered.sort_unstable();
        ResourceError::UnknownArtifact {
            id: id.to_string(),
            registered: registered.join(", "),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
