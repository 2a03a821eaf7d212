//! Directory-backed blob cache.
//!
//! Entries live under `<cache_dir>/entries/<key>` and mirror the same key in
//! the build root. Every store records a digest in `index.json`; every load
//! re-checks it, so a corrupt entry fails loudly instead of being served.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::blob::{BlobCache, CacheKey};
use crate::error::CacheError;
use crate::index::{CacheIndex, IndexEntry};
use crate::tree;

/// Subdirectory of the cache directory holding entry trees.
const ENTRIES_SUBDIR: &str = "entries";

/// Blob cache that mirrors build-root paths into a cache directory.
pub struct DirCache {
    /// Root directory for all cache files.
    cache_dir: PathBuf,

    /// Build root that keys resolve against.
    build_root: PathBuf,
}

/// Outcome of verifying one cache entry against the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryHealth {
    /// The entry matches its recorded digest.
    Intact,
    /// The entry exists but has no index record.
    Unindexed,
    /// The index records the key but the entry is gone.
    Missing,
    /// The entry differs from its recorded digest.
    Corrupt {
        /// Digest recorded at store time.
        expected: String,
        /// Digest computed now.
        actual: String,
    },
}

impl DirCache {
    /// Creates a cache rooted at `cache_dir` for the given build root.
    pub fn new(cache_dir: &Path, build_root: &Path) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
            build_root: build_root.to_path_buf(),
        }
    }

    /// Returns the cache root directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the build root keys resolve against.
    pub fn build_root(&self) -> &Path {
        &self.build_root
    }

    /// Returns where the cached copy of `key` lives.
    ///
    /// Reading from this path does not touch the build root, which makes it
    /// suitable for read-only inspection.
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        key.under(&self.cache_dir.join(ENTRIES_SUBDIR))
    }

    /// Checks one entry against its recorded digest.
    pub fn verify(&self, key: &CacheKey) -> Result<EntryHealth, CacheError> {
        let index = CacheIndex::load(&self.cache_dir).unwrap_or_default();
        self.verify_with(&index, key)
    }

    /// Checks every indexed entry. Fails if the index itself is unreadable.
    pub fn verify_all(&self) -> Result<Vec<(String, EntryHealth)>, CacheError> {
        let index = CacheIndex::read(&self.cache_dir)?.unwrap_or_default();
        let mut results = Vec::with_capacity(index.entries.len());
        for name in index.entries.keys() {
            let key = CacheKey::new(name)?;
            results.push((name.clone(), self.verify_with(&index, &key)?));
        }
        Ok(results)
    }

    fn verify_with(&self, index: &CacheIndex, key: &CacheKey) -> Result<EntryHealth, CacheError> {
        let entry = self.entry_path(key);
        let recorded = index.entries.get(&key.as_slash_string());
        let present = entry.exists();
        let recorded = match (recorded, present) {
            (None, _) => {
                return Ok(if present {
                    EntryHealth::Unindexed
                } else {
                    EntryHealth::Missing
                })
            }
            (Some(_), false) => return Ok(EntryHealth::Missing),
            (Some(recorded), true) => recorded,
        };
        let actual = tree::digest_tree(&entry)?;
        if recorded.content_hash() == Some(actual.hash) {
            Ok(EntryHealth::Intact)
        } else {
            Ok(EntryHealth::Corrupt {
                expected: recorded.digest.clone(),
                actual: actual.hash.to_string(),
            })
        }
    }

    fn update_index(&self, key: &CacheKey, entry: Option<IndexEntry>) -> Result<(), CacheError> {
        let mut index = match CacheIndex::read(&self.cache_dir) {
            Ok(Some(index)) if index.is_compatible() => index,
            Ok(Some(index)) => {
                warn!(
                    format_version = index.format_version,
                    "cache index has another format version, starting a new one"
                );
                CacheIndex::new()
            }
            Ok(None) => CacheIndex::new(),
            Err(e) => {
                warn!(error = %e, "cache index unreadable, recorded digests are dropped");
                CacheIndex::new()
            }
        };
        match entry {
            Some(entry) => index.entries.insert(key.as_slash_string(), entry),
            None => index.entries.remove(&key.as_slash_string()),
        };
        index.save(&self.cache_dir)
    }
}

impl BlobCache for DirCache {
    fn exists(&self, key: &CacheKey) -> bool {
        self.entry_path(key).exists()
    }

    fn load(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let entry = self.entry_path(key);
        if !entry.exists() {
            debug!(%key, "cache miss");
            return Ok(false);
        }
        if let EntryHealth::Corrupt { expected, actual } = self.verify(key)? {
            return Err(CacheError::ChecksumMismatch {
                key: key.to_string(),
                expected,
                actual,
            });
        }
        let files = tree::replace_tree(&entry, &key.under(&self.build_root))?;
        debug!(%key, files, "loaded from cache");
        Ok(true)
    }

    fn store(&self, key: &CacheKey) -> Result<(), CacheError> {
        let source = key.under(&self.build_root);
        let entry = self.entry_path(key);
        if !source.exists() {
            tree::remove_tree(&entry)?;
            debug!(%key, "source absent, cache entry dropped");
            return self.update_index(key, None);
        }
        let staging = tree::staging_path(&entry);
        tree::remove_tree(&staging)?;
        tree::copy_tree(&source, &staging)?;
        let digest = tree::digest_tree(&staging)?;
        tree::swap_in(&staging, &entry)?;
        debug!(%key, files = digest.files, bytes = digest.bytes, "stored in cache");
        self.update_index(key, Some(IndexEntry::from_digest(&digest)))
    }
}
