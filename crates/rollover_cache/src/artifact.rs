//! Artifact sets: the names a generation serves, and where each comes from.
//!
//! Merging generations is expressed over these sets before anything is
//! written, so the merge order and collision policy can be exercised without
//! touching the filesystem. Only [`ArtifactSet::materialize`] performs I/O.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::CacheError;
use crate::tree;

/// A mapping from artifact name (relative path) to the file providing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactSet {
    entries: BTreeMap<PathBuf, PathBuf>,
}

impl ArtifactSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from every file below `root`. A missing root is empty.
    pub fn scan(root: &Path) -> Result<Self, CacheError> {
        let entries = tree::list_files(root)?
            .into_iter()
            .filter(|(relative, _)| !relative.as_os_str().is_empty())
            .collect();
        Ok(Self { entries })
    }

    /// Adds or replaces one artifact.
    pub fn insert(&mut self, name: impl Into<PathBuf>, source: impl Into<PathBuf>) {
        self.entries.insert(name.into(), source.into());
    }

    /// Returns the number of artifacts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the set has no artifacts.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if an artifact with this name is present.
    pub fn contains(&self, name: &Path) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the file providing `name`.
    pub fn source(&self, name: &Path) -> Option<&Path> {
        self.entries.get(name).map(PathBuf::as_path)
    }

    /// Iterates over artifact names in order.
    pub fn names(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }

    /// Returns the names present in both sets.
    pub fn shared_names<'a>(&'a self, other: &'a ArtifactSet) -> impl Iterator<Item = &'a Path> {
        self.names().filter(move |name| other.contains(name))
    }

    /// Lays `self` over `base`: every name from either set is present, and on
    /// a name collision the artifact from `self` wins.
    ///
    /// A collision includes a file in one set sitting where the other set has
    /// a directory (`fonts` against `fonts/a.woff`). The shape from `self`
    /// wins and the conflicting base entries are dropped.
    pub fn overlay_onto(&self, base: &ArtifactSet) -> ArtifactSet {
        let dirs: HashSet<&Path> = self
            .entries
            .keys()
            .flat_map(|name| name.ancestors().skip(1))
            .filter(|dir| !dir.as_os_str().is_empty())
            .collect();
        let mut entries: BTreeMap<PathBuf, PathBuf> = base
            .entries
            .iter()
            .filter(|(name, _)| !self.shadows(name, &dirs))
            .map(|(name, source)| (name.clone(), source.clone()))
            .collect();
        for (name, source) in &self.entries {
            entries.insert(name.clone(), source.clone());
        }
        ArtifactSet { entries }
    }

    /// Returns `true` if a base artifact at `name` cannot coexist with this
    /// set: a file of ours sits on one of its parent directories, or `name`
    /// is a directory of ours.
    fn shadows(&self, name: &Path, dirs: &HashSet<&Path>) -> bool {
        dirs.contains(name)
            || name
                .ancestors()
                .skip(1)
                .any(|parent| self.entries.contains_key(parent))
    }

    /// Writes every artifact into `dest`. Returns the number of files written.
    pub fn materialize(&self, dest: &Path) -> Result<usize, CacheError> {
        std::fs::create_dir_all(dest).map_err(|e| CacheError::io(dest, e))?;
        for (name, source) in &self.entries {
            tree::copy_file(source, &dest.join(name))?;
        }
        Ok(self.entries.len())
    }
}
