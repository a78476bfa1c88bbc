//! Runtime configuration.
//!
//! Every field has a default, so a config file or the environment only needs
//! to name what it changes.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use shadow_resources::catalog;
use shadow_resources::paths::CACHE_DIR_ENV;
use shadow_state::cache::DEFAULT_TOMBSTONE_CAPACITY;
use shadow_state::history::DEFAULT_HISTORY_CAPACITY;

pub const REMOTE_URL_ENV: &str = "SHADOWLIB_REMOTE_URL";
pub const OFFLINE_ENV: &str = "SHADOWLIB_OFFLINE";
pub const REVISION_ENV: &str = "SHADOWLIB_REVISION";
pub const HTTP_TIMEOUT_ENV: &str = "SHADOWLIB_HTTP_TIMEOUT_SECS";

/// Configuration for [`Runtime::initialize`](crate::runtime::Runtime::initialize).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Base cache directory. `None` uses the platform default; the versioned
    /// layout directory is created beneath it either way.
    pub cache_dir: Option<PathBuf>,
    /// Base URL game data is fetched from.
    pub remote_url: String,
    /// Per-request HTTP timeout in seconds.
    pub http_timeout_secs: u64,
    /// Skip the remote revision check and use the locally pinned revision.
    pub offline: bool,
    /// Use this game-data revision instead of asking the remote.
    pub revision: Option<String>,
    /// Events kept per channel in the event history.
    pub history_capacity: usize,
    /// Removed entities whose removal stamp is remembered.
    pub tombstone_capacity: usize,
    /// Default wait for [`Runtime::await_warm`](crate::runtime::Runtime::await_warm).
    pub warmup_timeout_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            remote_url: catalog::DEFAULT_REMOTE_BASE.to_owned(),
            http_timeout_secs: 30,
            offline: false,
            revision: None,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            tombstone_capacity: DEFAULT_TOMBSTONE_CAPACITY,
            warmup_timeout_ms: 30_000,
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `SHADOWLIB_*` environment variables.
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var_os(key))
    }

    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading runtime config {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("parsing runtime config {}", path.display()))?;
        Ok(config)
    }

    /// Apply environment-style overrides read through `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let text = |key: &str| {
            lookup(key)
                .map(|v| v.to_string_lossy().trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        if let Some(dir) = lookup(CACHE_DIR_ENV).filter(|v| !v.is_empty()) {
            self.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = text(REMOTE_URL_ENV) {
            self.remote_url = url;
        }
        if let Some(revision) = text(REVISION_ENV) {
            self.revision = Some(revision);
        }
        if let Some(flag) = text(OFFLINE_ENV) {
            self.offline = matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(secs) = text(HTTP_TIMEOUT_ENV) {
            match secs.parse() {
                Ok(secs) => self.http_timeout_secs = secs,
                Err(_) => tracing::warn!(key = HTTP_TIMEOUT_ENV, value = %secs, "ignoring unparseable timeout"),
            }
        }
        self
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn warmup_timeout(&self) -> Duration {
        Duration::from_millis(self.warmup_timeout_ms)
    }
}
