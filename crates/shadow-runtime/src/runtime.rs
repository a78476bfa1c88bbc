//! Explicit process bootstrap.
//!
//! [`Runtime::initialize`] is the single place where the library touches the
//! disk and network at startup:
//!
//! 1. resolve and create the cache root (the only fatal step),
//! 2. determine the game-data revision (config pin, local pin when offline,
//!    otherwise the remote),
//! 3. load whatever constants can be loaded, generating artifacts as needed,
//! 4. build the event cache and the namespace registry.
//!
//! Anything that fails after step 1 is logged and the runtime continues with
//! the constants it has. A cold cache with no network therefore yields a
//! working runtime with empty constants rather than an error.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use shadow_resources::artifact::ArtifactId;
use shadow_resources::catalog;
use shadow_resources::constants::GameConstants;
use shadow_resources::descriptor::Fingerprint;
use shadow_resources::fetch::ResourceFetcher;
use shadow_resources::generate::ArtifactGenerator;
use shadow_resources::loader::DynamicLoader;
use shadow_resources::paths::CacheRoot;
use shadow_resources::source::{HttpSource, RemoteSource};
use shadow_resources::ResourceError;
use shadow_state::cache::{EventCache, EventCacheConfig};
use shadow_state::consumer::{ConsumerHandle, EventSource};
use shadow_state::warmup::WarmupOutcome;

use crate::config::RuntimeConfig;
use crate::namespace::{NamespaceHandle, NamespaceId};
use crate::registry::NamespaceRegistry;
use crate::RuntimeError;

pub struct Runtime {
    config: RuntimeConfig,
    fetcher: Arc<ResourceFetcher>,
    loader: Arc<DynamicLoader>,
    revision: Option<Fingerprint>,
    missing: Vec<ArtifactId>,
    cache: Arc<EventCache>,
    registry: NamespaceRegistry,
    consumer: Mutex<Option<ConsumerHandle>>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("root", &self.fetcher.root().path())
            .field("revision", &self.revision)
            .field("missing", &self.missing)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Bootstrap against the configured HTTP remote.
    ///
    /// # Errors
    ///
    /// [`ResourceError::CacheUnavailable`] if the cache root cannot be
    /// created, or a fetch error if the HTTP client cannot be built.
    pub fn initialize(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let source = HttpSource::new(config.remote_url.clone(), config.http_timeout())
            .map_err(ResourceError::from)?;
        Self::with_source(config, Arc::new(source))
    }

    /// Bootstrap against an arbitrary remote.
    pub fn with_source(config: RuntimeConfig, source: Arc<dyn RemoteSource>) -> Result<Self, RuntimeError> {
        let root = CacheRoot::resolve(config.cache_dir.as_deref())?;
        tracing::debug!(root = %root.path().display(), "cache root ready");

        let fetcher = Arc::new(ResourceFetcher::new(root, source));
        let revision = determine_revision(&config, &fetcher)?;
        let specs = revision
            .as_ref()
            .map(catalog::standard_artifacts)
            .unwrap_or_default();
        let generator = Arc::new(ArtifactGenerator::new(Arc::clone(&fetcher)));
        let loader = Arc::new(DynamicLoader::new(generator, specs));

        let (constants, failures) = loader.load_available_constants();
        let mut missing = Vec::with_capacity(failures.len());
        for (id, err) in failures {
            if matches!(err, ResourceError::CacheUnavailable { .. }) {
                return Err(err.into());
            }
            tracing::warn!(artifact = %id, error = %err, "artifact unavailable, continuing without it");
            missing.push(id);
        }
        if constants.is_empty() {
            tracing::warn!("no game data available; name and varbit lookups will be empty");
        }

        let cache_config = EventCacheConfig {
            history_capacity: config.history_capacity,
            tombstone_capacity: config.tombstone_capacity,
            ..EventCacheConfig::default()
        };
        let cache = Arc::new(EventCache::new(cache_config, Arc::new(constants)));
        let registry = NamespaceRegistry::new(Arc::clone(&cache));

        tracing::info!(
            root = %fetcher.root().path().display(),
            revision = revision.as_ref().map(Fingerprint::as_str).unwrap_or("none"),
            items = cache.constants().item_count(),
            missing = missing.len(),
            "runtime initialized"
        );

        Ok(Self {
            config,
            fetcher,
            loader,
            revision,
            missing,
            cache,
            registry,
            consumer: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn root(&self) -> &CacheRoot {
        self.fetcher.root()
    }

    pub fn fetcher(&self) -> &Arc<ResourceFetcher> {
        &self.fetcher
    }

    pub fn loader(&self) -> &Arc<DynamicLoader> {
        &self.loader
    }

    /// Game-data revision in use, if one could be determined.
    pub fn revision(&self) -> Option<&Fingerprint> {
        self.revision.as_ref()
    }

    pub fn constants(&self) -> &Arc<GameConstants> {
        self.cache.constants()
    }

    /// Standard artifacts that failed to load at startup.
    pub fn missing_artifacts(&self) -> &[ArtifactId] {
        &self.missing
    }

    /// `true` if startup could not load every standard artifact.
    pub fn is_degraded(&self) -> bool {
        self.revision.is_none() || !self.missing.is_empty()
    }

    pub fn cache(&self) -> &Arc<EventCache> {
        &self.cache
    }

    pub fn registry(&self) -> &NamespaceRegistry {
        &self.registry
    }

    /// Shared handle for `id`, constructed on first use.
    pub fn namespace(&self, id: NamespaceId) -> Arc<NamespaceHandle> {
        self.registry.get(id)
    }

    // -- event stream ---------------------------------------------------------

    /// Start feeding the event cache from `source`.
    ///
    /// # Errors
    ///
    /// [`StateError::AlreadySubscribed`](shadow_state::StateError::AlreadySubscribed)
    /// if a source is already attached.
    pub fn attach(&self, source: impl EventSource) -> Result<(), RuntimeError> {
        let handle = self.cache.subscribe(source)?;
        *self.consumer.lock() = Some(handle);
        Ok(())
    }

    /// Wait for the cache to warm, using the configured timeout if `timeout`
    /// is `None`.
    pub fn await_warm(&self, timeout: Option<Duration>) -> WarmupOutcome {
        self.cache
            .await_warm(timeout.unwrap_or_else(|| self.config.warmup_timeout()))
    }

    /// Block until the attached source ends. Returns the number of events
    /// consumed, or `None` if nothing was attached.
    pub fn join_consumer(&self) -> Result<Option<u64>, RuntimeError> {
        let handle = self.consumer.lock().take();
        match handle {
            Some(handle) => Ok(Some(handle.join()?)),
            None => Ok(None),
        }
    }
}

/// Revision to generate artifacts for. `Ok(None)` means no data is
/// available; only an unusable cache root is an error.
fn determine_revision(
    config: &RuntimeConfig,
    fetcher: &ResourceFetcher,
) -> Result<Option<Fingerprint>, ResourceError> {
    if let Some(revision) = &config.revision {
        return Ok(Some(Fingerprint::new(revision.clone())));
    }

    if config.offline {
        let pinned = fetcher.pinned(catalog::PINNED_REVISION).map(Fingerprint::new);
        if pinned.is_none() {
            tracing::warn!("offline with no pinned game data revision");
        }
        return Ok(pinned);
    }

    match catalog::resolve_revision(fetcher) {
        Ok(revision) => Ok(Some(revision)),
        Err(err @ ResourceError::CacheUnavailable { .. }) => Err(err),
        Err(err) => {
            tracing::warn!(error = %err, "game data revision unavailable");
            Ok(None)
        }
    }
}
