//! Shared project helpers for CLI commands.
//!
//! Resolves the project root and configuration, and turns the configured
//! paths into cache keys, a blob cache, and the desired version.

use std::path::{Path, PathBuf};

use rollover_cache::{read_desired_version, CacheKey, CacheLayout, DirCache};
use rollover_common::VersionToken;
use rollover_config::{ProjectConfig, CONFIG_FILE};

use crate::GlobalArgs;

/// A project root together with its loaded configuration.
pub struct Project {
    /// Directory containing the configuration; all key paths resolve here.
    pub root: PathBuf,
    /// The validated configuration.
    pub config: ProjectConfig,
}

/// Walks up from `start` looking for the nearest directory containing `rollover.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Loads the project named by the global CLI args.
///
/// If `--config` names a file, that file is loaded and its directory is the
/// project root. If it names a directory, `rollover.toml` is loaded from it.
/// Otherwise walks up from the current directory.
pub fn load_project(global: &GlobalArgs) -> Result<Project, Box<dyn std::error::Error>> {
    match &global.config {
        Some(config_path) => {
            let path = PathBuf::from(config_path);
            if path.is_file() {
                let root = match path.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                    _ => PathBuf::from("."),
                };
                let config = rollover_config::load_config_file(&path)?;
                Ok(Project { root, config })
            } else {
                let config = rollover_config::load_config(&path)?;
                Ok(Project { root: path, config })
            }
        }
        None => {
            let root = find_project_root(&std::env::current_dir()?)?;
            let config = rollover_config::load_config(&root)?;
            Ok(Project { root, config })
        }
    }
}

impl Project {
    /// Returns the cache keys named by `[paths]`.
    pub fn layout(&self) -> Result<CacheLayout, Box<dyn std::error::Error>> {
        let paths = &self.config.paths;
        Ok(CacheLayout {
            live_output: CacheKey::new(&paths.live_output)?,
            manifest: CacheKey::new(&paths.manifest)?,
            metadata: CacheKey::new(&paths.metadata)?,
        })
    }

    /// Returns the cache directory, preferring a command-line override.
    ///
    /// A relative override resolves against the current directory; a
    /// relative configured directory resolves against the project root.
    pub fn cache_dir(&self, cli_override: Option<&str>) -> Result<PathBuf, std::io::Error> {
        match cli_override {
            Some(dir) => {
                let dir = PathBuf::from(dir);
                if dir.is_absolute() {
                    Ok(dir)
                } else {
                    Ok(std::env::current_dir()?.join(dir))
                }
            }
            None => Ok(self.config.cache.resolve_dir(&self.root)),
        }
    }

    /// Opens the directory blob cache for this project.
    pub fn open_cache(&self, cli_override: Option<&str>) -> Result<DirCache, std::io::Error> {
        Ok(DirCache::new(&self.cache_dir(cli_override)?, &self.root))
    }

    /// Returns the desired version: the override if given, else the version
    /// file. `None` means neither names one and the default applies.
    pub fn desired_version(
        &self,
        cli_override: Option<&str>,
    ) -> Result<Option<VersionToken>, Box<dyn std::error::Error>> {
        if let Some(raw) = cli_override {
            return Ok(Some(raw.parse::<VersionToken>()?));
        }
        let path = self.root.join(&self.config.paths.version_file);
        Ok(read_desired_version(&path)?)
    }
}
