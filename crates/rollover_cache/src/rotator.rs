//! Generation rotation after a successful rebuild.
//!
//! Rotation adopts the fresh build as the newest generation, rebuilds the live
//! output as the previous generation overlaid with the newest one, evicts the
//! generation that fell off the ladder, and finally records the new ladder.
//! Recording comes last so that an interrupted rotation leaves the old tokens
//! in place and the next run rebuilds.

use std::path::{Path, PathBuf};

use rollover_common::VersionToken;
use tracing::{debug, info, warn};

use crate::artifact::ArtifactSet;
use crate::error::CacheError;
use crate::generation::GenerationStore;
use crate::metadata::LadderMetadata;
use crate::oracle::ResolvedVersions;
use crate::tree;

/// How a rotation treats the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationKind {
    /// A new version: the ladder shifts down by one.
    Advance,
    /// The recorded current version is rebuilt after a cold start; the
    /// ladder keeps its positions.
    Refresh,
    /// A forced rebuild; the ladder and the recorded tokens stay frozen.
    Forced,
}

/// What a rotation will do, computed from the resolved versions alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPlan {
    /// How the ladder moves.
    pub kind: RotationKind,
    /// Slot that receives the fresh build.
    pub now: VersionToken,
    /// Generation merged underneath the fresh build, if one can be named.
    pub merge_base: Option<VersionToken>,
    /// Generation that falls off the ladder, if one can be named.
    pub older: Option<VersionToken>,
}

impl RotationPlan {
    /// Plans the rotation for a rebuild of `versions`.
    ///
    /// A new version shifts the ladder: the desired token becomes `now`, the
    /// last built one becomes the merge base, and the recorded prior (or,
    /// failing that, the numeric predecessor of the last built token) falls
    /// off.
    ///
    /// Rebuilding the recorded current version, or forcing a rebuild, keeps
    /// the ladder in place: the fresh build replaces the slot of the last
    /// built token, the recorded prior stays the merge base, and nothing is
    /// evicted. Only a forced rebuild leaves the recorded tokens unwritten.
    pub fn for_versions(versions: &ResolvedVersions) -> Self {
        let kind = if versions.desired.is_force() {
            RotationKind::Forced
        } else if versions.desired == versions.last_built {
            RotationKind::Refresh
        } else {
            RotationKind::Advance
        };
        let prior = versions
            .recorded_prior
            .clone()
            .or_else(|| versions.last_built.predecessor());

        match kind {
            RotationKind::Advance => Self {
                kind,
                now: versions.desired.clone(),
                merge_base: Some(versions.last_built.clone()),
                older: prior,
            },
            RotationKind::Refresh | RotationKind::Forced => Self {
                kind,
                now: versions.last_built.clone(),
                merge_base: prior,
                older: None,
            },
        }
    }

    /// Returns `true` if the rotation writes the recorded tokens.
    pub fn records(&self) -> bool {
        self.kind != RotationKind::Forced
    }

    /// Returns the generation to evict, skipping any that the new ladder keeps.
    pub fn eviction_target(&self) -> Option<&VersionToken> {
        self.older
            .as_ref()
            .filter(|older| **older != self.now && Some(*older) != self.merge_base.as_ref())
    }
}

/// What a rotation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationReport {
    /// Token of the generation now serving.
    pub now: VersionToken,
    /// Generation merged underneath it.
    pub merge_base: Option<VersionToken>,
    /// Generation removed from the ladder, if one was present.
    pub evicted: Option<VersionToken>,
    /// Whether the tokens were recorded.
    pub recorded: bool,
    /// Files contributed by the fresh build.
    pub fresh_files: usize,
    /// Files kept from the merge base because the fresh build lacks them.
    pub carried_over: usize,
    /// Merge base files replaced by a same-named fresh file.
    pub overwritten: usize,
}

impl RotationReport {
    /// Total number of files in the live output.
    pub fn live_files(&self) -> usize {
        self.fresh_files + self.carried_over
    }
}

/// Performs rotations against one metadata directory.
pub struct GenerationRotator {
    metadata_dir: PathBuf,
    store: GenerationStore,
}

impl GenerationRotator {
    /// Creates a rotator for the slots and tokens under `metadata_dir`.
    pub fn new(metadata_dir: &Path) -> Self {
        Self {
            metadata_dir: metadata_dir.to_path_buf(),
            store: GenerationStore::new(metadata_dir),
        }
    }

    /// Returns the generation slots this rotator manages.
    pub fn store(&self) -> &GenerationStore {
        &self.store
    }

    /// Runs `plan`, taking the fresh build from `fresh` and recreating the
    /// live output at `live`.
    pub fn rotate(
        &self,
        plan: &RotationPlan,
        fresh: &Path,
        live: &Path,
    ) -> Result<RotationReport, CacheError> {
        self.store.adopt(fresh, &plan.now)?;
        let newest = self.store.artifacts(&plan.now)?;

        let base = match &plan.merge_base {
            Some(base) if *base != plan.now => {
                if !self.store.contains(base) {
                    warn!(generation = %base, "previous generation missing, merging nothing");
                }
                self.store.artifacts(base)?
            }
            _ => ArtifactSet::new(),
        };

        let merged = newest.overlay_onto(&base);
        let overwritten = newest.shared_names(&base).count();
        let carried_over = merged.len() - newest.len();

        // The old live output stays in place until the merged one is complete.
        let staging = tree::staging_path(live);
        tree::remove_tree(&staging)?;
        if let Err(e) = merged.materialize(&staging) {
            if let Err(cleanup) = tree::remove_tree(&staging) {
                warn!(error = %cleanup, "failed to remove staged live output");
            }
            return Err(e);
        }
        tree::swap_in(&staging, live)?;
        debug!(
            live = %live.display(),
            files = merged.len(),
            overwritten,
            "live output rebuilt"
        );

        let evicted = match plan.eviction_target() {
            Some(older) => self.store.evict(older)?.then(|| older.clone()),
            None => {
                if plan.kind == RotationKind::Advance && plan.older.is_none() {
                    warn!(
                        last = ?plan.merge_base,
                        "no generation two steps back can be named, skipping eviction"
                    );
                }
                None
            }
        };

        if plan.records() {
            LadderMetadata::save(&self.metadata_dir, &plan.now, plan.merge_base.as_ref())?;
        }

        info!(
            now = %plan.now,
            last = ?plan.merge_base,
            evicted = ?evicted,
            kind = ?plan.kind,
            "generations rotated"
        );

        Ok(RotationReport {
            now: plan.now.clone(),
            merge_base: plan.merge_base.clone(),
            evicted,
            recorded: plan.records(),
            fresh_files: newest.len(),
            carried_over,
            overwritten,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(s: &str) -> VersionToken {
        VersionToken::new(s).unwrap()
    }

    fn versions(desired: &str, last: &str, prior: Option<&str>) -> ResolvedVersions {
        ResolvedVersions {
            desired: tok(desired),
            last_built: tok(last),
            recorded_prior: prior.map(tok),
        }
    }

    fn write_files(dir: &Path, files: &[(&str, &str)]) {
        std::fs::create_dir_all(dir).unwrap();
        for (name, content) in files {
            std::fs::write(dir.join(name), content).unwrap();
        }
    }

    #[test]
    fn plan_shifts_ladder() {
        let plan = RotationPlan::for_versions(&versions("3", "2", Some("1")));
        assert_eq!(plan.now, "3");
        assert_eq!(plan.merge_base, Some(tok("2")));
        assert_eq!(plan.eviction_target(), Some(&tok("1")));
        assert_eq!(plan.kind, RotationKind::Advance);
        assert!(plan.records());
    }

    #[test]
    fn plan_derives_older_from_predecessor() {
        let plan = RotationPlan::for_versions(&versions("2", "1", None));
        assert_eq!(plan.eviction_target(), Some(&tok("0")));
    }

    #[test]
    fn plan_non_numeric_without_prior_skips_eviction() {
        let plan = RotationPlan::for_versions(&versions("beta", "alpha", None));
        assert!(plan.older.is_none());
        assert!(plan.eviction_target().is_none());
    }

    #[test]
    fn plan_never_evicts_a_kept_generation() {
        let plan = RotationPlan::for_versions(&versions("3", "2", Some("3")));
        assert!(plan.eviction_target().is_none());
    }

    #[test]
    fn plan_refresh_keeps_positions() {
        let plan = RotationPlan::for_versions(&versions("5", "5", Some("4")));
        assert_eq!(plan.kind, RotationKind::Refresh);
        assert_eq!(plan.now, "5");
        assert_eq!(plan.merge_base, Some(tok("4")));
        assert!(plan.eviction_target().is_none());
        assert!(plan.records());
    }

    #[test]
    fn plan_force_freezes_ladder() {
        let plan = RotationPlan::for_versions(&versions("FORCE", "5", Some("4")));
        assert_eq!(plan.now, "5");
        assert_eq!(plan.merge_base, Some(tok("4")));
        assert!(plan.eviction_target().is_none());
        assert!(!plan.records());
    }

    #[test]
    fn rotate_merges_and_evicts() {
        let dir = tempfile::tempdir().unwrap();
        let meta = dir.path().join("meta");
        let rotator = GenerationRotator::new(&meta);
        let slots = rotator.store();

        write_files(&slots.slot_path(&tok("0")), &[("ancient.js", "0")]);
        write_files(
            &slots.slot_path(&tok("1")),
            &[("app-1.js", "1"), ("logo.png", "old logo")],
        );
        let fresh = dir.path().join("public/dist");
        write_files(&fresh, &[("app-2.js", "2"), ("logo.png", "new logo")]);

        let plan = RotationPlan::for_versions(&versions("2", "1", None));
        let report = rotator.rotate(&plan, &fresh, &fresh).unwrap();

        assert_eq!(std::fs::read_to_string(fresh.join("logo.png")).unwrap(), "new logo");
        assert!(fresh.join("app-1.js").exists());
        assert!(fresh.join("app-2.js").exists());
        assert!(!fresh.join("ancient.js").exists());
        assert!(!slots.contains(&tok("0")));
        assert_eq!(report.evicted, Some(tok("0")));
        assert_eq!(report.overwritten, 1);
        assert_eq!(report.carried_over, 1);
        assert_eq!(report.live_files(), 3);

        let recorded = LadderMetadata::load(&meta).unwrap();
        assert_eq!(recorded.current, Some(tok("2")));
        assert_eq!(recorded.prior, Some(tok("1")));
    }

    #[test]
    fn rotate_with_separate_output_clears_stale_live_files() {
        let dir = tempfile::tempdir().unwrap();
        let rotator = GenerationRotator::new(&dir.path().join("meta"));
        let fresh = dir.path().join("build-out");
        let live = dir.path().join("public/dist");
        write_files(&fresh, &[("app.js", "new")]);
        write_files(&live, &[("stale.js", "stale")]);

        let plan = RotationPlan::for_versions(&versions("1", "0", None));
        rotator.rotate(&plan, &fresh, &live).unwrap();
        assert!(live.join("app.js").exists());
        assert!(!live.join("stale.js").exists());
    }

    #[test]
    fn rotate_discards_leftover_staging() {
        let dir = tempfile::tempdir().unwrap();
        let rotator = GenerationRotator::new(&dir.path().join("meta"));
        let fresh = dir.path().join("out");
        let live = dir.path().join("public/dist");
        write_files(&fresh, &[("app.js", "new")]);
        write_files(&live, &[("old.js", "old")]);
        let staging = tree::staging_path(&live);
        write_files(&staging, &[("half-written.js", "partial")]);

        let plan = RotationPlan::for_versions(&versions("1", "0", None));
        rotator.rotate(&plan, &fresh, &live).unwrap();

        assert!(live.join("app.js").exists());
        assert!(!live.join("half-written.js").exists());
        assert!(!live.join("old.js").exists());
        assert!(!staging.exists());
    }

    #[test]
    fn rotate_directory_over_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let meta = dir.path().join("meta");
        let rotator = GenerationRotator::new(&meta);
        write_files(
            &rotator.store().slot_path(&tok("1")),
            &[("fonts", "a file"), ("app-1.js", "1")],
        );
        let fresh = dir.path().join("public/dist");
        std::fs::create_dir_all(fresh.join("fonts")).unwrap();
        std::fs::write(fresh.join("fonts/a.woff"), "woff").unwrap();

        let plan = RotationPlan::for_versions(&versions("2", "1", None));
        let report = rotator.rotate(&plan, &fresh, &fresh).unwrap();

        assert_eq!(std::fs::read_to_string(fresh.join("fonts/a.woff")).unwrap(), "woff");
        assert!(fresh.join("app-1.js").exists());
        assert_eq!(report.carried_over, 1);
        assert_eq!(report.live_files(), 2);
        assert_eq!(LadderMetadata::load(&meta).unwrap().current, Some(tok("2")));
    }

    #[test]
    fn rotate_force_keeps_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let meta = dir.path().join("meta");
        LadderMetadata::save(&meta, &tok("5"), Some(&tok("4"))).unwrap();
        let rotator = GenerationRotator::new(&meta);
        write_files(&rotator.store().slot_path(&tok("4")), &[("four.js", "4")]);
        write_files(&rotator.store().slot_path(&tok("5")), &[("five.js", "stale")]);
        let fresh = dir.path().join("out");
        write_files(&fresh, &[("five.js", "rebuilt")]);
        let live = dir.path().join("live");

        let plan = RotationPlan::for_versions(&versions("FORCE", "5", Some("4")));
        let report = rotator.rotate(&plan, &fresh, &live).unwrap();

        assert!(!report.recorded);
        assert!(report.evicted.is_none());
        assert_eq!(std::fs::read_to_string(live.join("five.js")).unwrap(), "rebuilt");
        assert!(live.join("four.js").exists());
        let recorded = LadderMetadata::load(&meta).unwrap();
        assert_eq!(recorded.current, Some(tok("5")));
        assert_eq!(recorded.prior, Some(tok("4")));
    }

    #[test]
    fn rotate_missing_fresh_output_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let meta = dir.path().join("meta");
        let rotator = GenerationRotator::new(&meta);
        let live = dir.path().join("live");
        write_files(&live, &[("app.js", "old")]);

        let plan = RotationPlan::for_versions(&versions("2", "1", None));
        let err = rotator
            .rotate(&plan, &dir.path().join("absent"), &live)
            .unwrap_err();
        assert!(matches!(err, CacheError::MissingBuildOutput { .. }));
        assert!(live.join("app.js").exists());
        assert_eq!(LadderMetadata::load(&meta).unwrap(), LadderMetadata::default());
    }
}
