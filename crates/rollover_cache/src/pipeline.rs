//! One decide, build, rotate run against a blob cache.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rollover_common::VersionToken;
use tracing::{debug, info, info_span, warn};

use crate::blob::{BlobCache, CacheKey};
use crate::decision::{decide, RebuildDecision, RebuildReason};
use crate::error::CacheError;
use crate::fallback::{DegradedReport, FallbackPolicy};
use crate::invoker::{BuildInvoker, BuildOutcome};
use crate::metadata::LadderMetadata;
use crate::oracle::VersionOracle;
use crate::rotator::{GenerationRotator, RotationPlan, RotationReport};
use crate::tree;

/// The cache keys a pipeline works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    /// Live output directory served to clients.
    pub live_output: CacheKey,
    /// Side-channel manifest directory stored alongside the live output.
    pub manifest: CacheKey,
    /// Metadata directory holding recorded tokens and generation slots.
    pub metadata: CacheKey,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Cached artifacts were valid and have been loaded.
    Skipped {
        /// Version the loaded artifacts belong to.
        version: VersionToken,
    },
    /// A build ran and its generation was rotated in.
    Rebuilt {
        /// Why the build ran.
        reason: RebuildReason,
        /// What the rotation did.
        report: RotationReport,
        /// Time spent in the build step.
        elapsed: Duration,
        /// The build step was skipped because artifacts were precompiled.
        precompiled: bool,
    },
    /// The build failed; nothing in the cache changed.
    Degraded(DegradedReport),
}

/// Runs the rebuild pipeline for one build root.
pub struct Pipeline<'a, C: BlobCache> {
    cache: &'a C,
    build_root: PathBuf,
    layout: CacheLayout,
}

impl<'a, C: BlobCache> Pipeline<'a, C> {
    /// Creates a pipeline resolving `layout` keys against `build_root`.
    pub fn new(cache: &'a C, build_root: &Path, layout: CacheLayout) -> Self {
        Self {
            cache,
            build_root: build_root.to_path_buf(),
            layout,
        }
    }

    /// Runs one attempt: decide, then either load cached artifacts or build
    /// and rotate.
    ///
    /// Cache I/O failures are fatal and propagate. A failed build is not an
    /// error; it yields [`PipelineOutcome::Degraded`] with the cache untouched.
    /// The working copy of the metadata directory is removed from the build
    /// root however the run ends.
    pub fn run(
        &self,
        desired: Option<VersionToken>,
        invoker: &mut dyn BuildInvoker,
    ) -> Result<PipelineOutcome, CacheError> {
        let span = info_span!("rollover", desired = ?desired.as_ref().map(|t| t.as_str()));
        let _enter = span.enter();

        let metadata_dir = self.layout.metadata.under(&self.build_root);
        let _scratch = Scratch(&metadata_dir);

        let metadata_loaded = self.load_intact(&self.layout.metadata)?;
        let recorded = if metadata_loaded {
            LadderMetadata::load(&metadata_dir)?
        } else {
            // Leftovers from an interrupted run are not trusted.
            tree::remove_tree(&metadata_dir)?;
            LadderMetadata::default()
        };
        let versions = VersionOracle::resolve(desired, &recorded);

        let decision = decide(
            &versions.desired,
            &versions.last_built,
            self.cache.exists(&self.layout.live_output),
            metadata_loaded,
        );
        debug!(
            desired = %versions.desired,
            last_built = %versions.last_built,
            %decision,
            "rebuild decision"
        );

        let reason = match decision {
            RebuildDecision::Rebuild(reason) => reason,
            RebuildDecision::Skip => {
                self.load_intact(&self.layout.manifest)?;
                if self.load_intact(&self.layout.live_output)? {
                    info!(version = %versions.last_built, "artifacts up to date, loaded from cache");
                    return Ok(PipelineOutcome::Skipped {
                        version: versions.last_built,
                    });
                }
                RebuildReason::ColdStart {
                    live_output_missing: true,
                    metadata_missing: false,
                }
            }
        };

        let decision = RebuildDecision::Rebuild(reason);
        info!(desired = %versions.desired, reason = %decision, "building artifacts");
        let started = Instant::now();
        let outcome = invoker.run_build();
        let elapsed = started.elapsed();

        let (output_dir, precompiled) = match outcome {
            BuildOutcome::Success {
                output_dir,
                precompiled,
            } => (output_dir, precompiled),
            BuildOutcome::Failure { reason } => {
                return Ok(PipelineOutcome::Degraded(FallbackPolicy::on_failure(
                    reason, &versions,
                )));
            }
        };
        info!(
            elapsed_secs = elapsed.as_secs_f64(),
            precompiled,
            "build completed"
        );

        let plan = RotationPlan::for_versions(&versions);
        let live_dir = self.layout.live_output.under(&self.build_root);
        let report = GenerationRotator::new(&metadata_dir).rotate(&plan, &output_dir, &live_dir)?;

        self.cache.store(&self.layout.live_output)?;
        self.cache.store(&self.layout.manifest)?;
        self.cache.store(&self.layout.metadata)?;

        Ok(PipelineOutcome::Rebuilt {
            reason,
            report,
            elapsed,
            precompiled,
        })
    }
}

impl<C: BlobCache> Pipeline<'_, C> {
    /// Loads `key`, treating an entry that fails its digest check as absent.
    ///
    /// A torn store from an interrupted run shows up as a digest mismatch;
    /// discarding it turns the run into a cold start instead of a permanent
    /// failure.
    fn load_intact(&self, key: &CacheKey) -> Result<bool, CacheError> {
        match self.cache.load(key) {
            Err(CacheError::ChecksumMismatch { expected, actual, .. }) => {
                warn!(%key, %expected, %actual, "cached entry is corrupt, treating it as missing");
                Ok(false)
            }
            other => other,
        }
    }
}

/// Removes the metadata working copy when a run ends.
struct Scratch<'p>(&'p Path);

impl Drop for Scratch<'_> {
    fn drop(&mut self) {
        if let Err(e) = tree::remove_tree(self.0) {
            warn!(error = %e, "failed to remove metadata scratch directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dir_cache::DirCache;

    struct Scripted {
        output: PathBuf,
        files: Vec<&'static str>,
        fail: bool,
        calls: usize,
    }

    impl BuildInvoker for Scripted {
        fn run_build(&mut self) -> BuildOutcome {
            self.calls += 1;
            if self.fail {
                return BuildOutcome::Failure {
                    reason: "scripted failure".to_string(),
                };
            }
            std::fs::create_dir_all(&self.output).unwrap();
            for f in &self.files {
                std::fs::write(self.output.join(f), f).unwrap();
            }
            BuildOutcome::Success {
                output_dir: self.output.clone(),
                precompiled: false,
            }
        }
    }

    fn layout() -> CacheLayout {
        CacheLayout {
            live_output: CacheKey::new("public/dist").unwrap(),
            manifest: CacheKey::new("config/assets").unwrap(),
            metadata: CacheKey::new("vendor/rollover/assets").unwrap(),
        }
    }

    fn tok(s: &str) -> VersionToken {
        VersionToken::new(s).unwrap()
    }

    fn scripted(root: &Path, files: &[&'static str], fail: bool) -> Scripted {
        Scripted {
            output: root.join("public/dist"),
            files: files.to_vec(),
            fail,
            calls: 0,
        }
    }

    #[test]
    fn cold_start_builds_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("app");
        let cache = DirCache::new(&dir.path().join("cache"), &root);
        let pipeline = Pipeline::new(&cache, &root, layout());

        let mut build = scripted(&root, &["app-2.js"], false);
        let outcome = pipeline.run(Some(tok("2")), &mut build).unwrap();
        match outcome {
            PipelineOutcome::Rebuilt { reason, report, .. } => {
                assert!(matches!(reason, RebuildReason::ColdStart { .. }));
                assert_eq!(report.now, "2");
            }
            other => panic!("expected rebuild, got {other:?}"),
        }
        assert!(root.join("public/dist/app-2.js").exists());
        assert!(!root.join("vendor/rollover/assets").exists());

        let meta = LadderMetadata::load(&cache.entry_path(&layout().metadata)).unwrap();
        assert_eq!(meta.current, Some(tok("2")));
        assert_eq!(meta.prior, Some(tok("0")));
    }

    #[test]
    fn same_version_skips_build() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("app");
        let cache = DirCache::new(&dir.path().join("cache"), &root);
        let pipeline = Pipeline::new(&cache, &root, layout());

        pipeline
            .run(Some(tok("2")), &mut scripted(&root, &["app-2.js"], false))
            .unwrap();
        std::fs::remove_dir_all(root.join("public/dist")).unwrap();

        let mut build = scripted(&root, &["never.js"], false);
        let outcome = pipeline.run(Some(tok("2")), &mut build).unwrap();
        assert_eq!(outcome, PipelineOutcome::Skipped { version: tok("2") });
        assert_eq!(build.calls, 0);
        assert!(root.join("public/dist/app-2.js").exists());
        assert!(!root.join("vendor/rollover/assets").exists());
    }

    #[test]
    fn corrupt_metadata_entry_cold_starts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("app");
        let cache = DirCache::new(&dir.path().join("cache"), &root);
        let pipeline = Pipeline::new(&cache, &root, layout());
        pipeline
            .run(Some(tok("1")), &mut scripted(&root, &["app-1.js"], false))
            .unwrap();
        std::fs::remove_file(cache.entry_path(&layout().metadata).join("version")).unwrap();

        let mut build = scripted(&root, &["app-1.js"], false);
        let outcome = pipeline.run(Some(tok("1")), &mut build).unwrap();
        assert_eq!(build.calls, 1);
        match outcome {
            PipelineOutcome::Rebuilt { reason, .. } => assert_eq!(
                reason,
                RebuildReason::ColdStart {
                    live_output_missing: false,
                    metadata_missing: true,
                }
            ),
            other => panic!("expected rebuild, got {other:?}"),
        }
        let meta = LadderMetadata::load(&cache.entry_path(&layout().metadata)).unwrap();
        assert_eq!(meta.current, Some(tok("1")));
    }

    #[test]
    fn corrupt_live_output_rebuilds_instead_of_skipping() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("app");
        let cache = DirCache::new(&dir.path().join("cache"), &root);
        let pipeline = Pipeline::new(&cache, &root, layout());
        pipeline
            .run(Some(tok("1")), &mut scripted(&root, &["app-1.js"], false))
            .unwrap();
        std::fs::write(
            cache.entry_path(&layout().live_output).join("app-1.js"),
            "tampered",
        )
        .unwrap();

        let mut build = scripted(&root, &["app-1.js"], false);
        let outcome = pipeline.run(Some(tok("1")), &mut build).unwrap();
        assert_eq!(build.calls, 1);
        assert!(matches!(
            outcome,
            PipelineOutcome::Rebuilt {
                reason: RebuildReason::ColdStart {
                    live_output_missing: true,
                    ..
                },
                ..
            }
        ));
        assert_eq!(
            std::fs::read_to_string(cache.entry_path(&layout().live_output).join("app-1.js"))
                .unwrap(),
            "app-1.js"
        );
    }

    #[test]
    fn failed_build_is_degraded_and_cache_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("app");
        let cache = DirCache::new(&dir.path().join("cache"), &root);
        let pipeline = Pipeline::new(&cache, &root, layout());
        pipeline
            .run(Some(tok("1")), &mut scripted(&root, &["app-1.js"], false))
            .unwrap();

        let outcome = pipeline
            .run(Some(tok("2")), &mut scripted(&root, &[], true))
            .unwrap();
        match outcome {
            PipelineOutcome::Degraded(report) => {
                assert_eq!(report.desired, "2");
                assert_eq!(report.last_built, "1");
            }
            other => panic!("expected degraded, got {other:?}"),
        }
        let meta = LadderMetadata::load(&cache.entry_path(&layout().metadata)).unwrap();
        assert_eq!(meta.current, Some(tok("1")));
        assert!(cache
            .entry_path(&layout().live_output)
            .join("app-1.js")
            .exists());
        assert!(!root.join("vendor/rollover/assets").exists());
    }
}
