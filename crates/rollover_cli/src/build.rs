//! `rollover build`: decide, build if needed, rotate generations.
//!
//! 1. Find project root and load `rollover.toml`
//! 2. Open the blob cache and resolve the desired version
//! 3. Run the pipeline with the configured build command
//! 4. Report the outcome; on failure run the remediation hook

use std::path::Path;
use std::process::Command;

use rollover_cache::{
    BuildInvoker, BuildOutcome, CommandInvoker, DegradedReport, Pipeline, PipelineOutcome,
    RebuildDecision, RotationReport,
};
use rollover_config::{FallbackConfig, ProjectConfig};
use tracing::warn;

use crate::project::load_project;
use crate::{BuildArgs, GlobalArgs};

/// Exit code for a failed build under `--strict`.
const EXIT_DEGRADED: i32 = 2;

/// Runs the `rollover build` command.
///
/// Returns exit code 0 on skip, rebuild, and degraded outcomes; 2 on a
/// degraded outcome when `--strict` is set.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = load_project(global)?;
    let layout = project.layout()?;
    let cache = project.open_cache(args.cache_dir.as_deref())?;
    let desired = project.desired_version(args.desired.as_deref())?;

    if !global.quiet {
        eprintln!(
            "   Preparing {} (desired version {})",
            project.config.project.name,
            desired.as_ref().map_or("unset", |t| t.as_str())
        );
    }

    let mut invoker = build_invoker(&project.config, &project.root);
    let pipeline = Pipeline::new(&cache, &project.root, layout);

    match pipeline.run(desired, invoker.as_mut())? {
        PipelineOutcome::Skipped { version } => {
            if !global.quiet {
                eprintln!("     Fresh artifacts for version {version} loaded from cache");
            }
            Ok(0)
        }
        PipelineOutcome::Rebuilt {
            reason,
            report,
            elapsed,
            precompiled,
        } => {
            let reason = RebuildDecision::Rebuild(reason);
            if !global.quiet {
                if precompiled {
                    eprintln!("    Detected precompiled artifacts, build skipped ({reason})");
                } else {
                    eprintln!(
                        "    Compiled version {} ({reason}), completed ({:.2}s)",
                        report.now,
                        elapsed.as_secs_f64()
                    );
                }
                eprintln!("     Rotated {}", summarize_rotation(&report));
            }
            Ok(0)
        }
        PipelineOutcome::Degraded(report) => {
            if !global.quiet {
                eprintln!("warning: {report}");
                eprintln!("warning: cached artifacts are unchanged; resolving artifacts without the cache");
            }
            remediate(&report, &project.config.fallback, &project.root, global);
            Ok(if args.strict { EXIT_DEGRADED } else { 0 })
        }
    }
}

/// Builds the invoker for `[build]`. Without a command every build fails.
fn build_invoker(config: &ProjectConfig, root: &Path) -> Box<dyn BuildInvoker> {
    let output = root.join(config.build.output_path(&config.paths));
    let Some(mut invoker) = config
        .build
        .command
        .as_deref()
        .and_then(|command| CommandInvoker::new(command, root, &output))
    else {
        return Box::new(Unconfigured);
    };
    for (key, value) in &config.build.env {
        invoker = invoker.env_default(key, value);
    }
    if let Some(marker) = &config.build.precompiled_marker {
        invoker = invoker.precompiled_marker(root.join(marker));
    }
    Box::new(invoker)
}

/// Stands in for a project without a build command.
struct Unconfigured;

impl BuildInvoker for Unconfigured {
    fn run_build(&mut self) -> BuildOutcome {
        BuildOutcome::Failure {
            reason: "no build command configured in [build]".to_string(),
        }
    }
}

/// One-line description of a rotation.
fn summarize_rotation(report: &RotationReport) -> String {
    let mut line = format!("now {}", report.now);
    if let Some(base) = &report.merge_base {
        line.push_str(&format!(", last {base}"));
    }
    if let Some(evicted) = &report.evicted {
        line.push_str(&format!(", evicted {evicted}"));
    }
    if !report.recorded {
        line.push_str(" (recorded versions unchanged)");
    }
    line.push_str(&format!(
        ": {} file(s) live, {} carried over",
        report.live_files(),
        report.carried_over
    ));
    line
}

/// Runs the remediation command and prints the troubleshooting link.
///
/// A failing remediation is logged; the degraded outcome already stands.
fn remediate(report: &DegradedReport, fallback: &FallbackConfig, root: &Path, global: &GlobalArgs) {
    if let Some((program, args)) = fallback.command.split_first() {
        if !global.quiet {
            eprintln!("     Running remediation: {}", fallback.command.join(" "));
        }
        match Command::new(program).args(args).current_dir(root).status() {
            Ok(status) if status.success() => {}
            Ok(status) => warn!(%status, desired = %report.desired, "remediation command failed"),
            Err(e) => warn!(error = %e, program = %program, "remediation command could not run"),
        }
    }
    if let Some(url) = &fallback.help_url {
        if !global.quiet {
            eprintln!("Please see this article for troubleshooting help:");
            eprintln!("{url}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollover_cache::LadderMetadata;
    use rollover_common::VersionToken;

    fn tok(s: &str) -> VersionToken {
        VersionToken::new(s).unwrap()
    }

    fn global(config: &Path) -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            color: false,
            config: Some(config.display().to_string()),
        }
    }

    fn args(desired: Option<&str>, strict: bool) -> BuildArgs {
        BuildArgs {
            desired: desired.map(str::to_string),
            cache_dir: None,
            strict,
        }
    }

    fn report(now: &str, base: Option<&str>, evicted: Option<&str>, recorded: bool) -> RotationReport {
        RotationReport {
            now: tok(now),
            merge_base: base.map(tok),
            evicted: evicted.map(tok),
            recorded,
            fresh_files: 2,
            carried_over: 1,
            overwritten: 1,
        }
    }

    #[test]
    fn summary_lists_ladder() {
        assert_eq!(
            summarize_rotation(&report("2", Some("1"), Some("0"), true)),
            "now 2, last 1, evicted 0: 3 file(s) live, 1 carried over"
        );
    }

    #[test]
    fn summary_marks_frozen_ladder() {
        assert_eq!(
            summarize_rotation(&report("5", Some("4"), None, false)),
            "now 5, last 4 (recorded versions unchanged): 3 file(s) live, 1 carried over"
        );
    }

    #[test]
    fn unconfigured_build_fails() {
        let config = rollover_config::load_config_from_str("[project]\nname = \"x\"\n").unwrap();
        let mut invoker = build_invoker(&config, Path::new("."));
        assert!(matches!(invoker.run_build(), BuildOutcome::Failure { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn build_then_skip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("rollover.toml"),
            r#"[project]
name = "shop"

[build]
command = ["sh", "-c", "mkdir -p public/dist && echo built > public/dist/app.js"]
"#,
        )
        .unwrap();
        let g = global(dir.path());

        assert_eq!(run(&args(Some("3"), false), &g).unwrap(), 0);
        let meta = LadderMetadata::load(
            &dir.path().join(".rollover-cache/entries/vendor/rollover/assets"),
        )
        .unwrap();
        assert_eq!(meta.current, Some(tok("3")));

        std::fs::remove_dir_all(dir.path().join("public/dist")).unwrap();
        assert_eq!(run(&args(Some("3"), false), &g).unwrap(), 0);
        assert!(dir.path().join("public/dist/app.js").exists());
    }

    #[cfg(unix)]
    #[test]
    fn failed_build_degrades() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("rollover.toml"),
            r#"[project]
name = "shop"

[build]
command = ["sh", "-c", "exit 1"]

[fallback]
command = ["sh", "-c", "touch remediated"]
"#,
        )
        .unwrap();
        let g = global(dir.path());

        assert_eq!(run(&args(Some("2"), false), &g).unwrap(), 0);
        assert!(dir.path().join("remediated").exists());
        assert_eq!(run(&args(Some("2"), true), &g).unwrap(), EXIT_DEGRADED);
        assert!(!dir.path().join(".rollover-cache/entries/public/dist").exists());
    }
}
