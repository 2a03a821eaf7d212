//! `rollover verify`: re-hash cached entries against the index.

use rollover_cache::EntryHealth;

use crate::project::load_project;
use crate::{GlobalArgs, VerifyArgs};

/// Runs the `rollover verify` command.
///
/// Returns exit code 0 if every indexed entry is intact, 1 otherwise.
pub fn run(args: &VerifyArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = load_project(global)?;
    let cache = project.open_cache(args.cache_dir.as_deref())?;

    if !global.quiet {
        eprintln!("   Verifying {}", cache.cache_dir().display());
    }

    let results = cache.verify_all()?;
    let mut failures = 0;
    for (key, health) in &results {
        let line = describe(key, health);
        if is_failure(health) {
            failures += 1;
            eprintln!("error: {line}");
        } else if global.verbose {
            eprintln!("     {line}");
        }
    }

    if !global.quiet {
        eprintln!(
            "   Result: {} entr{} checked, {} problem(s)",
            results.len(),
            if results.len() == 1 { "y" } else { "ies" },
            failures
        );
    }

    Ok(if failures == 0 { 0 } else { 1 })
}

fn is_failure(health: &EntryHealth) -> bool {
    matches!(health, EntryHealth::Missing | EntryHealth::Corrupt { .. })
}

fn describe(key: &str, health: &EntryHealth) -> String {
    match health {
        EntryHealth::Intact => format!("{key}: ok"),
        EntryHealth::Unindexed => format!("{key}: not indexed"),
        EntryHealth::Missing => format!("{key}: indexed but missing"),
        EntryHealth::Corrupt { expected, actual } => {
            format!("{key}: digest mismatch (expected {expected}, got {actual})")
        }
    }
}
