//! Cache directory resolution.
//!
//! A [`CacheRoot`] is a versioned directory containing exactly two
//! subtrees: `generated/` for derived artifacts and `data/` for downloaded
//! raw resources. Resolving a root creates whatever is missing and never
//! deletes anything; [`CacheRoot::clear`] is the only destructive operation
//! and is never called implicitly.
//!
//! # Location
//!
//! The base directory is chosen in this order:
//!
//! 1. an explicit override passed to [`CacheRoot::resolve`],
//! 2. `$SHADOWLIB_CACHE_DIR`,
//! 3. `$XDG_CACHE_HOME/shadowlib`,
//! 4. the platform cache directory (`dirs::cache_dir()`) + `shadowlib`,
//! 5. `~/.cache/shadowlib`.
//!
//! The root itself is `<base>/v<LAYOUT_VERSION>`, so a layout change never
//! reads files written by an older layout.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::ResourceError;

/// Version of the on-disk layout. Bumping it moves the root to a new subdir.
pub const LAYOUT_VERSION: u32 = 1;

/// Environment variable that overrides the cache base directory.
pub const CACHE_DIR_ENV: &str = "SHADOWLIB_CACHE_DIR";

const APP_DIR: &str = "shadowlib";
const GENERATED_DIR: &str = "generated";
const DATA_DIR: &str = "data";

/// The two subtrees of a cache root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Derived artifacts, written only by the artifact generator.
    Generated,
    /// Downloaded raw resources, written only by the resource fetcher.
    Data,
}

impl Category {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Generated => GENERATED_DIR,
            Self::Data => DATA_DIR,
        }
    }
}

// ---------------------------------------------------------------------------
// CacheRoot
// ---------------------------------------------------------------------------

/// A resolved, existing cache directory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRoot {
    root: PathBuf,
}

impl CacheRoot {
    /// Resolve the cache root, creating `generated/` and `data/` if missing.
    ///
    /// Idempotent: calling it again on a populated root leaves every file in
    /// place.
    ///
    /// # Errors
    ///
    /// [`ResourceError::CacheUnavailable`] if no base directory can be
    /// determined or the tree cannot be created.
    pub fn resolve(override_dir: Option<&Path>) -> Result<Self, ResourceError> {
        let base = match override_dir {
            Some(dir) => dir.to_path_buf(),
            None => default_base_dir(|key| std::env::var_os(key)).ok_or_else(|| {
                ResourceError::CacheUnavailable {
                    path: PathBuf::from(format!("~/.cache/{APP_DIR}")),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "no home or cache directory could be determined",
                    ),
                }
            })?,
        };
        Self::at(base.join(format!("v{LAYOUT_VERSION}")))
    }

    /// Use `root` directly as the versioned root (no layout subdir appended).
    pub fn at(root: impl Into<PathBuf>) -> Result<Self, ResourceError> {
        let cache = Self { root: root.into() };
        cache.create_tree()?;
        tracing::debug!(root = %cache.root.display(), "cache root ready");
        Ok(cache)
    }

    fn create_tree(&self) -> Result<(), ResourceError> {
        for category in [Category::Generated, Category::Data] {
            let dir = self.category_dir(category);
            std::fs::create_dir_all(&dir)
                .map_err(|source| ResourceError::CacheUnavailable { path: dir, source })?;
        }
        Ok(())
    }

    /// The versioned root directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// The directory for one category.
    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.root.join(category.dir_name())
    }

    /// `data/<resource_type>`, the directory a family of raw resources lives in.
    pub fn data_dir(&self, resource_type: &str) -> Result<PathBuf, ResourceError> {
        self.subpath(Category::Data, resource_type)
    }

    /// Join a relative `name` under a category directory.
    ///
    /// `name` may contain `/`-separated subdirectories but must be relative
    /// and free of `..` components.
    pub fn subpath(&self, category: Category, name: &str) -> Result<PathBuf, ResourceError> {
        let relative = Path::new(name);
        let mut saw_component = false;
        for component in relative.components() {
            match component {
                Component::Normal(_) => saw_component = true,
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(ResourceError::InvalidPath {
                        name: name.to_owned(),
                    })
                }
            }
        }
        if !saw_component {
            return Err(ResourceError::InvalidPath {
                name: name.to_owned(),
            });
        }
        Ok(self.category_dir(category).join(relative))
    }

    /// Total size in bytes of every regular file under the root.
    pub fn size_bytes(&self) -> Result<u64, ResourceError> {
        dir_size(&self.root)
    }

    /// Remove every file under both subtrees, then recreate the empty tree.
    pub fn clear(&self) -> Result<(), ResourceError> {
        for category in [Category::Generated, Category::Data] {
            let dir = self.category_dir(category);
            match std::fs::remove_dir_all(&dir) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(ResourceError::io(dir, e)),
            }
        }
        tracing::info!(root = %self.root.display(), "cache cleared");
        self.create_tree()
    }
}

fn dir_size(dir: &Path) -> Result<u64, ResourceError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(ResourceError::io(dir, e)),
    };
    let mut total = 0;
    for entry in entries {
        let entry = entry.map_err(|e| ResourceError::io(dir, e))?;
        let meta = entry
            .metadata()
            .map_err(|e| ResourceError::io(entry.path(), e))?;
        if meta.is_dir() {
            total += dir_size(&entry.path())?;
        } else {
            total += meta.len();
        }
    }
    Ok(total)
}

/// Pick the base cache directory from the environment.
///
/// `lookup` is the environment accessor so resolution can be tested without
/// mutating the process environment.
pub fn default_base_dir(lookup: impl Fn(&str) -> Option<OsString>) -> Option<PathBuf> {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);

    if let Some(dir) = non_empty(CACHE_DIR_ENV) {
        return Some(dir);
    }
    if let Some(xdg) = non_empty("XDG_CACHE_HOME") {
        return Some(xdg.join(APP_DIR));
    }
    if let Some(cache) = dirs::cache_dir() {
        return Some(cache.join(APP_DIR));
    }
    dirs::home_dir().map(|home| home.join(".cache").join(APP_DIR))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_creates_both_subtrees() {
        let tmp = tempfile::tempdir().unwrap();
        let root = CacheRoot::resolve(Some(tmp.path())).unwrap();

        assert_eq!(root.path(), tmp.path().join("v1"));
        assert!(root.category_dir(Category::Generated).is_dir());
        assert!(root.category_dir(Category::Data).is_dir());
    }

    #[test]
    fn resolve_is_idempotent_and_keeps_content() {
        let tmp = tempfile::tempdir().unwrap();
        let root = CacheRoot::resolve(Some(tmp.path())).unwrap();
        let file = root.subpath(Category::Data, "game_data/items.json").unwrap();
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, b"[]").unwrap();

        let again = CacheRoot::resolve(Some(tmp.path())).unwrap();
        assert_eq!(root, again);
        assert_eq!(std::fs::read(&file).unwrap(), b"[]");
    }

    #[test]
    fn resolve_fails_when_root_is_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocked");
        std::fs::write(&blocker, b"not a dir").unwrap();

        let err = CacheRoot::at(&blocker).unwrap_err();
        assert!(matches!(err, ResourceError::CacheUnavailable { .. }));
    }

    #[test]
    fn subpath_rejects_escapes() {
        let tmp = tempfile::tempdir().unwrap();
        let root = CacheRoot::resolve(Some(tmp.path())).unwrap();

        for bad in ["../outside", "/etc/passwd", "a/../../b", "", "."] {
            let err = root.subpath(Category::Generated, bad).unwrap_err();
            assert!(matches!(err, ResourceError::InvalidPath { .. }), "{bad}");
        }
        let ok = root.subpath(Category::Generated, "./items.json").unwrap();
        assert!(ok.starts_with(root.category_dir(Category::Generated)));
    }

    #[test]
    fn size_and_clear() {
        let tmp = tempfile::tempdir().unwrap();
        let root = CacheRoot::resolve(Some(tmp.path())).unwrap();
        assert_eq!(root.size_bytes().unwrap(), 0);

        let data = root.subpath(Category::Data, "game_data/a.bin").unwrap();
        std::fs::create_dir_all(data.parent().unwrap()).unwrap();
        std::fs::write(&data, [0u8; 10]).unwrap();
        std::fs::write(root.subpath(Category::Generated, "b.json").unwrap(), [0u8; 5]).unwrap();
        assert_eq!(root.size_bytes().unwrap(), 15);

        root.clear().unwrap();
        assert_eq!(root.size_bytes().unwrap(), 0);
        assert!(root.category_dir(Category::Data).is_dir());
        assert!(root.category_dir(Category::Generated).is_dir());
    }

    #[test]
    fn base_dir_prefers_explicit_env() {
        let dir = default_base_dir(|key| match key {
            CACHE_DIR_ENV => Some("/custom".into()),
            "XDG_CACHE_HOME" => Some("/xdg".into()),
            _ => None,
        });
        assert_eq!(dir, Some(PathBuf::from("/custom")));
    }

    #[test]
    fn base_dir_uses_xdg_when_set() {
        let dir = default_base_dir(|key| match key {
            "XDG_CACHE_HOME" => Some("/xdg".into()),
            _ => None,
        });
        assert_eq!(dir, Some(PathBuf::from("/xdg/shadowlib")));
    }

    #[test]
    fn base_dir_ignores_empty_values() {
        let dir = default_base_dir(|key| match key {
            CACHE_DIR_ENV => Some("".into()),
            "XDG_CACHE_HOME" => Some("/xdg".into()),
            _ => None,
        });
        assert_eq!(dir, Some(PathBuf::from("/xdg/shadowlib")));
    }
}
