//! Configuration types deserialized from `rollover.toml`.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The top-level project configuration parsed from `rollover.toml`.
#[derive(Debug, Deserialize)]
pub struct ProjectConfig {
    /// Core project metadata.
    pub project: ProjectMeta,
    /// Cache key namespace and the desired-version source.
    #[serde(default)]
    pub paths: PathsConfig,
    /// Blob cache location.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Build command and its environment defaults.
    #[serde(default)]
    pub build: BuildConfig,
    /// Remediation hook for failed builds.
    #[serde(default)]
    pub fallback: FallbackConfig,
}

/// Core project metadata required in every `rollover.toml`.
#[derive(Debug, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// A brief description of the project.
    #[serde(default)]
    pub description: String,
}

/// Paths, relative to the project root, that make up the cache key namespace.
///
/// Each path is also a key in the blob cache: the cache mirrors the project
/// tree, so the live output directory at `public/dist` is cached under the
/// key `public/dist`.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Live output directory served to clients.
    #[serde(default = "default_live_output")]
    pub live_output: String,
    /// Side-channel manifest directory produced by the build tool.
    #[serde(default = "default_manifest")]
    pub manifest: String,
    /// Metadata directory holding recorded tokens and generation slots.
    #[serde(default = "default_metadata")]
    pub metadata: String,
    /// File holding the desired version token.
    #[serde(default = "default_version_file")]
    pub version_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            live_output: default_live_output(),
            manifest: default_manifest(),
            metadata: default_metadata(),
            version_file: default_version_file(),
        }
    }
}

fn default_live_output() -> String {
    "public/dist".to_string()
}

fn default_manifest() -> String {
    "config/assets".to_string()
}

fn default_metadata() -> String {
    "vendor/rollover/assets".to_string()
}

fn default_version_file() -> String {
    "config/assets-version".to_string()
}

/// Location of the blob cache.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Cache root directory. Relative paths resolve against the project root.
    #[serde(default = "default_cache_dir")]
    pub dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

fn default_cache_dir() -> String {
    ".rollover-cache".to_string()
}

impl CacheConfig {
    /// Resolves the cache root against the project directory.
    pub fn resolve_dir(&self, project_dir: &Path) -> PathBuf {
        let dir = Path::new(&self.dir);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            project_dir.join(dir)
        }
    }
}

/// Build command configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildConfig {
    /// Program and arguments of the artifact-producing build. `None` when the
    /// project has no build configured.
    pub command: Option<Vec<String>>,
    /// Directory the build writes fresh artifacts to. Defaults to the live
    /// output path.
    pub output: Option<String>,
    /// A file whose presence means artifacts were compiled ahead of time, so
    /// the build command is not run.
    pub precompiled_marker: Option<String>,
    /// Environment defaults for the build. A variable already present in the
    /// invoking environment is never overridden.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl BuildConfig {
    /// Returns the build output path, falling back to the live output path.
    pub fn output_path<'a>(&'a self, paths: &'a PathsConfig) -> &'a str {
        self.output.as_deref().unwrap_or(&paths.live_output)
    }
}

/// Remediation settings applied when a build fails.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FallbackConfig {
    /// Optional remediation command, run from the project root.
    #[serde(default)]
    pub command: Vec<String>,
    /// Optional troubleshooting link printed with the failure message.
    pub help_url: Option<String>,
}
