//! Conformance test helpers for the rollover pipeline.
//!
//! Provides an on-disk fixture (a build root plus a directory blob cache) and
//! a scripted build step, so integration tests can drive whole decide, build,
//! rotate runs and inspect the cache afterwards.

#![warn(missing_docs)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rollover_cache::{
    tree, BlobCache, BuildInvoker, BuildOutcome, CacheError, CacheKey, CacheLayout, DirCache,
    GenerationStore, LadderMetadata, Pipeline, PipelineOutcome,
};
use rollover_common::VersionToken;
use walkdir::WalkDir;

/// Live output key used by every fixture.
pub const LIVE_OUTPUT: &str = "public/dist";
/// Manifest key used by every fixture.
pub const MANIFEST: &str = "config/assets";
/// Metadata key used by every fixture.
pub const METADATA: &str = "vendor/rollover/assets";

/// Parses a token, panicking on invalid input.
pub fn tok(s: &str) -> VersionToken {
    VersionToken::new(s).unwrap()
}

/// A build root and its blob cache under one base directory.
pub struct Fixture {
    root: PathBuf,
    cache: DirCache,
}

impl Fixture {
    /// Creates a fixture with the build root at `<base>/app` and the cache at
    /// `<base>/cache`.
    pub fn new(base: &Path) -> Self {
        let root = base.join("app");
        std::fs::create_dir_all(&root).unwrap();
        let cache = DirCache::new(&base.join("cache"), &root);
        Self { root, cache }
    }

    /// The cache keys every fixture uses.
    pub fn layout() -> CacheLayout {
        CacheLayout {
            live_output: CacheKey::new(LIVE_OUTPUT).unwrap(),
            manifest: CacheKey::new(MANIFEST).unwrap(),
            metadata: CacheKey::new(METADATA).unwrap(),
        }
    }

    /// Returns the build root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the blob cache.
    pub fn cache(&self) -> &DirCache {
        &self.cache
    }

    /// Runs one pipeline attempt with `desired` (or the default when `None`).
    pub fn run(&self, desired: Option<&str>, build: &mut ScriptedBuild) -> PipelineOutcome {
        Pipeline::new(&self.cache, &self.root, Self::layout())
            .run(desired.map(tok), build)
            .unwrap()
    }

    /// Runs one attempt that dies at `at`, as a killed process would.
    ///
    /// Returns the error the run stopped with.
    pub fn run_interrupted(
        &self,
        desired: Option<&str>,
        build: &mut ScriptedBuild,
        at: Interruption,
    ) -> CacheError {
        let cache = InterruptedCache {
            inner: &self.cache,
            metadata: CacheKey::new(METADATA).unwrap(),
            at,
        };
        Pipeline::new(&cache, &self.root, Self::layout())
            .run(desired.map(tok), build)
            .unwrap_err()
    }

    /// A build step writing `files` into this fixture's live output path.
    pub fn build(&self, files: &[(&str, &str)]) -> ScriptedBuild {
        ScriptedBuild::producing(&self.root.join(LIVE_OUTPUT), files)
    }

    /// A build step that fails.
    pub fn failing_build(&self) -> ScriptedBuild {
        ScriptedBuild::failing(&self.root.join(LIVE_OUTPUT))
    }

    /// Records tokens in the cached metadata, as if earlier runs had.
    pub fn seed(&self, current: &str, prior: &str) {
        self.edit_cached_metadata(|scratch| {
            LadderMetadata::save(scratch, &tok(current), Some(&tok(prior))).unwrap();
        });
    }

    /// Records only a current token, as a cache written without a prior would.
    pub fn seed_current(&self, current: &str) {
        self.edit_cached_metadata(|scratch| {
            LadderMetadata::save(scratch, &tok(current), None).unwrap();
        });
    }

    /// Places a generation slot in the cached metadata.
    pub fn seed_generation(&self, token: &str, files: &[(&str, &str)]) {
        self.edit_cached_metadata(|scratch| {
            write_files(&GenerationStore::new(scratch).slot_path(&tok(token)), files);
        });
    }

    fn edit_cached_metadata(&self, edit: impl FnOnce(&Path)) {
        let key = CacheKey::new(METADATA).unwrap();
        let scratch = key.under(&self.root);
        self.cache.load(&key).unwrap();
        edit(&scratch);
        self.cache.store(&key).unwrap();
        std::fs::remove_dir_all(&scratch).unwrap();
    }

    /// Places live output files into the cache.
    pub fn seed_live(&self, files: &[(&str, &str)]) {
        let live = self.root.join(LIVE_OUTPUT);
        write_files(&live, files);
        self.cache.store(&CacheKey::new(LIVE_OUTPUT).unwrap()).unwrap();
    }

    /// Tokens recorded in the cached metadata.
    pub fn recorded(&self) -> LadderMetadata {
        LadderMetadata::load(&self.cached_metadata_dir()).unwrap()
    }

    /// Generations with a slot in the cached metadata.
    pub fn cached_generations(&self) -> Vec<String> {
        GenerationStore::new(&self.cached_metadata_dir())
            .generations()
            .unwrap()
            .iter()
            .map(|t| t.to_string())
            .collect()
    }

    /// Files of the live output in the build root, with contents.
    pub fn live_files(&self) -> BTreeMap<String, String> {
        read_files(&self.root.join(LIVE_OUTPUT))
    }

    /// Files of the live output in the cache, with contents.
    pub fn cached_live_files(&self) -> BTreeMap<String, String> {
        read_files(&self.cache.entry_path(&CacheKey::new(LIVE_OUTPUT).unwrap()))
    }

    /// Every file under the cache directory, with contents.
    pub fn cache_snapshot(&self) -> BTreeMap<String, String> {
        read_files(self.cache.cache_dir())
    }

    fn cached_metadata_dir(&self) -> PathBuf {
        self.cache.entry_path(&CacheKey::new(METADATA).unwrap())
    }
}

/// Where an interrupted run stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    /// After the live output and manifest are stored, before the metadata is.
    BeforeMetadataStore,
    /// Partway through copying the metadata: the entry holds all but the last
    /// file of the new tree while the index still records the old digest.
    DuringMetadataStore,
}

/// A blob cache that stops at a chosen point of the metadata store.
struct InterruptedCache<'a> {
    inner: &'a DirCache,
    metadata: CacheKey,
    at: Interruption,
}

impl BlobCache for InterruptedCache<'_> {
    fn exists(&self, key: &CacheKey) -> bool {
        self.inner.exists(key)
    }

    fn load(&self, key: &CacheKey) -> Result<bool, CacheError> {
        self.inner.load(key)
    }

    fn store(&self, key: &CacheKey) -> Result<(), CacheError> {
        if *key != self.metadata {
            return self.inner.store(key);
        }
        let entry = self.inner.entry_path(key);
        if self.at == Interruption::DuringMetadataStore {
            let source = key.under(self.inner.build_root());
            let mut files = tree::list_files(&source)?;
            files.pop();
            tree::remove_tree(&entry)?;
            for (relative, absolute) in &files {
                tree::copy_file(absolute, &entry.join(relative))?;
            }
        }
        Err(CacheError::Io {
            path: entry,
            source: std::io::Error::other("process killed"),
        })
    }
}

/// A build step that writes a declared set of files or fails.
///
/// Every run starts from an empty output directory, like a build in a fresh
/// checkout.
pub struct ScriptedBuild {
    output: PathBuf,
    files: Vec<(String, String)>,
    fail: bool,
    /// Number of times the build ran.
    pub calls: usize,
}

impl ScriptedBuild {
    /// A build writing `files` (name, content) into `output`.
    pub fn producing(output: &Path, files: &[(&str, &str)]) -> Self {
        Self {
            output: output.to_path_buf(),
            files: files
                .iter()
                .map(|(name, content)| (name.to_string(), content.to_string()))
                .collect(),
            fail: false,
            calls: 0,
        }
    }

    /// A build that always fails, leaving a partial file behind.
    pub fn failing(output: &Path) -> Self {
        Self {
            output: output.to_path_buf(),
            files: vec![("partial.js".to_string(), "half".to_string())],
            fail: true,
            calls: 0,
        }
    }
}

impl BuildInvoker for ScriptedBuild {
    fn run_build(&mut self) -> BuildOutcome {
        self.calls += 1;
        if self.output.exists() {
            std::fs::remove_dir_all(&self.output).unwrap();
        }
        std::fs::create_dir_all(&self.output).unwrap();
        for (name, content) in &self.files {
            std::fs::write(self.output.join(name), content).unwrap();
        }
        if self.fail {
            return BuildOutcome::Failure {
                reason: "scripted build failure".to_string(),
            };
        }
        BuildOutcome::Success {
            output_dir: self.output.clone(),
            precompiled: false,
        }
    }
}

/// Writes `files` (name, content) into `dir`, creating it.
pub fn write_files(dir: &Path, files: &[(&str, &str)]) {
    std::fs::create_dir_all(dir).unwrap();
    for (name, content) in files {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
}

/// Reads every file below `dir` keyed by `/`-separated relative path.
/// A missing directory reads as empty.
pub fn read_files(dir: &Path) -> BTreeMap<String, String> {
    let mut files = BTreeMap::new();
    if !dir.is_dir() {
        return files;
    }
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.unwrap();
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dir)
            .unwrap()
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        files.insert(rel, std::fs::read_to_string(entry.path()).unwrap());
    }
    files
}
