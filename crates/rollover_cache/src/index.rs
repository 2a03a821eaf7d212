//! Index of stored cache entries.
//!
//! The index is stored as `index.json` in the cache directory. It records, for
//! every stored key, the digest of the entry at store time so that a later
//! load can detect a corrupted entry instead of serving it.

use std::collections::BTreeMap;
use std::path::Path;

use rollover_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::tree::TreeDigest;

/// Name of the index file within the cache directory.
const INDEX_FILE: &str = "index.json";

/// Current index format version. Increment on breaking changes.
const INDEX_FORMAT_VERSION: u32 = 1;

/// Top-level index of all stored cache entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheIndex {
    /// Index format version. An index with another version is discarded.
    pub format_version: u32,

    /// Per-key entry records, keyed by `/`-separated cache key.
    pub entries: BTreeMap<String, IndexEntry>,
}

/// Recorded state of one stored cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Hex digest of the entry's file names and contents.
    pub digest: String,

    /// Number of files in the entry.
    pub files: usize,

    /// Total entry size in bytes.
    pub bytes: u64,
}

impl IndexEntry {
    /// Builds an entry record from a tree digest.
    pub fn from_digest(digest: &TreeDigest) -> Self {
        Self {
            digest: digest.hash.to_string(),
            files: digest.files,
            bytes: digest.bytes,
        }
    }

    /// Returns the recorded digest, or `None` if the stored text is not a digest.
    pub fn content_hash(&self) -> Option<ContentHash> {
        ContentHash::from_hex(&self.digest)
    }
}

impl CacheIndex {
    /// Creates a new, empty index.
    pub fn new() -> Self {
        Self {
            format_version: INDEX_FORMAT_VERSION,
            entries: BTreeMap::new(),
        }
    }

    /// Reads the index strictly.
    ///
    /// Returns `Ok(None)` if there is no index, and an error if the index
    /// exists but cannot be read or parsed.
    pub fn read(cache_dir: &Path) -> Result<Option<Self>, CacheError> {
        let path = cache_dir.join(INDEX_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(path, e)),
        };
        let index: Self = serde_json::from_str(&content).map_err(|e| CacheError::IndexParse {
            reason: e.to_string(),
        })?;
        Ok(Some(index))
    }

    /// Loads the index, returning `None` if it doesn't exist, can't be parsed,
    /// or was written in another format version.
    ///
    /// This is fail-safe: entries without an index record load unverified.
    pub fn load(cache_dir: &Path) -> Option<Self> {
        Self::read(cache_dir)
            .ok()
            .flatten()
            .filter(Self::is_compatible)
    }

    /// Saves the index to the cache directory, creating the directory if needed.
    pub fn save(&self, cache_dir: &Path) -> Result<(), CacheError> {
        std::fs::create_dir_all(cache_dir).map_err(|e| CacheError::io(cache_dir, e))?;
        let path = cache_dir.join(INDEX_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|e| CacheError::io(path, e))
    }

    /// Returns `true` if this index uses the current format version.
    pub fn is_compatible(&self) -> bool {
        self.format_version == INDEX_FORMAT_VERSION
    }
}

impl Default for CacheIndex {
    fn default() -> Self {
        Self::new()
    }
}
