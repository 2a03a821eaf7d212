//! End-to-end checks of when the pipeline runs the build step.

use rollover_cache::{PipelineOutcome, RebuildReason};
use rollover_conformance::{tok, Fixture};
use tempfile::TempDir;

fn rebuilt_reason(outcome: &PipelineOutcome) -> RebuildReason {
    match outcome {
        PipelineOutcome::Rebuilt { reason, .. } => *reason,
        other => panic!("expected a rebuild, got {other:?}"),
    }
}

#[test]
fn cold_start_with_defaults_builds_version_one() {
    let dir = TempDir::new().unwrap();
    let fx = Fixture::new(dir.path());

    let mut build = fx.build(&[("app-1.js", "one")]);
    let outcome = fx.run(None, &mut build);

    assert_eq!(build.calls, 1);
    assert_eq!(
        rebuilt_reason(&outcome),
        RebuildReason::ColdStart {
            live_output_missing: true,
            metadata_missing: true,
        }
    );
    let recorded = fx.recorded();
    assert_eq!(recorded.current, Some(tok("1")));
    assert_eq!(recorded.prior, Some(tok("0")));
}

#[test]
fn cold_start_ignores_matching_tokens() {
    let dir = TempDir::new().unwrap();
    let fx = Fixture::new(dir.path());
    fx.seed("3", "2");
    fx.seed_generation("3", &[("app-3.js", "three")]);

    let mut build = fx.build(&[("app-3.js", "three again")]);
    let outcome = fx.run(Some("3"), &mut build);

    assert_eq!(
        rebuilt_reason(&outcome),
        RebuildReason::ColdStart {
            live_output_missing: true,
            metadata_missing: false,
        }
    );
}

#[test]
fn cold_start_with_missing_metadata_rebuilds() {
    let dir = TempDir::new().unwrap();
    let fx = Fixture::new(dir.path());
    fx.seed_live(&[("app-4.js", "four")]);

    let mut build = fx.build(&[("app-4.js", "four")]);
    let outcome = fx.run(Some("4"), &mut build);

    assert_eq!(
        rebuilt_reason(&outcome),
        RebuildReason::ColdStart {
            live_output_missing: false,
            metadata_missing: true,
        }
    );
}

#[test]
fn equal_tokens_with_warm_cache_skip() {
    for version in ["1", "2", "release-7", "2024.06.01"] {
        let dir = TempDir::new().unwrap();
        let fx = Fixture::new(dir.path());
        fx.run(Some(version), &mut fx.build(&[("app.js", version)]));

        let mut build = fx.build(&[("never.js", "")]);
        let outcome = fx.run(Some(version), &mut build);

        assert_eq!(build.calls, 0, "version {version}");
        assert_eq!(outcome, PipelineOutcome::Skipped { version: tok(version) });
    }
}

#[test]
fn skip_loads_cached_live_output_verbatim() {
    let dir = TempDir::new().unwrap();
    let fx = Fixture::new(dir.path());
    fx.run(Some("2"), &mut fx.build(&[("app-2.js", "two")]));
    let cached = fx.cached_live_files();

    std::fs::remove_dir_all(fx.root().join("public/dist")).unwrap();
    fx.run(Some("2"), &mut fx.build(&[]));

    assert_eq!(fx.live_files(), cached);
    assert!(!fx.root().join("vendor/rollover/assets").exists());
}

#[test]
fn force_rebuilds_whatever_the_cache_holds() {
    let dir = TempDir::new().unwrap();
    let fx = Fixture::new(dir.path());

    let mut build = fx.build(&[("app.js", "cold")]);
    fx.run(Some("FORCE"), &mut build);
    assert_eq!(build.calls, 1);

    fx.run(Some("1"), &mut fx.build(&[("app.js", "warm")]));
    let mut build = fx.build(&[("app.js", "forced")]);
    let outcome = fx.run(Some("FORCE"), &mut build);
    assert_eq!(build.calls, 1);
    assert_eq!(rebuilt_reason(&outcome), RebuildReason::Forced);
}

#[test]
fn version_change_rebuilds() {
    let dir = TempDir::new().unwrap();
    let fx = Fixture::new(dir.path());
    fx.run(Some("1"), &mut fx.build(&[("app-1.js", "one")]));

    let mut build = fx.build(&[("app-2.js", "two")]);
    let outcome = fx.run(Some("2"), &mut build);
    assert_eq!(rebuilt_reason(&outcome), RebuildReason::VersionChanged);
}

#[test]
fn rotation_then_same_version_skips() {
    let dir = TempDir::new().unwrap();
    let fx = Fixture::new(dir.path());
    fx.run(Some("V1"), &mut fx.build(&[("a.js", "1")]));
    fx.run(Some("V2"), &mut fx.build(&[("b.js", "2")]));
    assert_eq!(fx.recorded().current, Some(tok("V2")));

    let mut build = fx.build(&[("c.js", "3")]);
    let outcome = fx.run(Some("V2"), &mut build);
    assert_eq!(build.calls, 0);
    assert_eq!(outcome, PipelineOutcome::Skipped { version: tok("V2") });
}
