//! Generation slots: one directory of artifacts per version token.

use std::path::{Path, PathBuf};

use rollover_common::VersionToken;

use crate::artifact::ArtifactSet;
use crate::error::CacheError;
use crate::tree;

/// Subdirectory of the metadata directory holding generation slots.
pub const GENERATIONS_SUBDIR: &str = "generations";

/// Generation slots kept under a metadata directory.
///
/// Slot `<metadata>/generations/<token>` holds the artifacts built for
/// `token`. Slots are separate from the recorded-token files so no token can
/// collide with them.
pub struct GenerationStore {
    root: PathBuf,
}

impl GenerationStore {
    /// Opens the slots under `metadata_dir`.
    pub fn new(metadata_dir: &Path) -> Self {
        Self {
            root: metadata_dir.join(GENERATIONS_SUBDIR),
        }
    }

    /// Returns the directory of the slot for `token`.
    pub fn slot_path(&self, token: &VersionToken) -> PathBuf {
        self.root.join(token.as_str())
    }

    /// Returns `true` if a slot exists for `token`.
    pub fn contains(&self, token: &VersionToken) -> bool {
        self.slot_path(token).is_dir()
    }

    /// Moves a freshly built artifact directory into the slot for `token`,
    /// replacing any previous contents of that slot.
    pub fn adopt(&self, fresh: &Path, token: &VersionToken) -> Result<(), CacheError> {
        if !fresh.is_dir() {
            return Err(CacheError::MissingBuildOutput {
                path: fresh.to_path_buf(),
            });
        }
        let slot = self.slot_path(token);
        tree::remove_tree(&slot)?;
        tree::move_tree(fresh, &slot)
    }

    /// Returns the artifacts held by the slot for `token`. A missing slot is empty.
    pub fn artifacts(&self, token: &VersionToken) -> Result<ArtifactSet, CacheError> {
        ArtifactSet::scan(&self.slot_path(token))
    }

    /// Deletes the slot for `token`. Returns `false` if there was none.
    pub fn evict(&self, token: &VersionToken) -> Result<bool, CacheError> {
        tree::remove_tree(&self.slot_path(token))
    }

    /// Lists the tokens that currently have a slot, in token order.
    pub fn generations(&self) -> Result<Vec<VersionToken>, CacheError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&self.root, e)),
        };
        let mut tokens = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::io(&self.root, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(token) = entry
                .file_name()
                .to_str()
                .and_then(|name| VersionToken::new(name).ok())
            {
                tokens.push(token);
            }
        }
        tokens.sort();
        Ok(tokens)
    }
}
