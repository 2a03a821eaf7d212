//! The blob cache contract consumed by the pipeline.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::error::CacheError;

/// A key in the blob cache: a relative path below the build root.
///
/// The cache mirrors the build tree, so the key `public/dist` names both the
/// live output directory in the build root and its cached copy.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(PathBuf);

impl CacheKey {
    /// Creates a key, rejecting absolute paths and paths that leave the root.
    pub fn new(key: impl AsRef<Path>) -> Result<Self, CacheError> {
        let raw = key.as_ref();
        let invalid = |reason: &str| CacheError::InvalidKey {
            key: raw.display().to_string(),
            reason: reason.to_string(),
        };

        let mut normalized = PathBuf::new();
        for component in raw.components() {
            match component {
                Component::Normal(part) => normalized.push(part),
                Component::CurDir => {}
                Component::ParentDir => return Err(invalid("escapes the build root")),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid("must be a relative path"))
                }
            }
        }
        if normalized.as_os_str().is_empty() {
            return Err(invalid("must not be empty"));
        }
        Ok(Self(normalized))
    }

    /// Returns the key as a relative path.
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Resolves the key against a root directory.
    pub fn under(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }

    /// Returns the key as a `/`-separated string, independent of platform.
    pub fn as_slash_string(&self) -> String {
        self.0
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_slash_string())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({self})")
    }
}

/// A key-value store of directory trees keyed by build-root path.
///
/// The pipeline issues its calls sequentially and relies on the
/// implementation to serialize its own `load`/`store` operations.
pub trait BlobCache {
    /// Returns `true` if the cache holds an entry for `key`.
    fn exists(&self, key: &CacheKey) -> bool;

    /// Replaces `key` in the build root with the cached entry.
    ///
    /// Returns `Ok(false)` and leaves the build root untouched when the cache
    /// has no entry for `key`.
    fn load(&self, key: &CacheKey) -> Result<bool, CacheError>;

    /// Replaces the cached entry for `key` with the current contents of `key`
    /// in the build root. A key missing from the build root removes the entry.
    fn store(&self, key: &CacheKey) -> Result<(), CacheError>;
}
