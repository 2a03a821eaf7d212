//! `rollover status`: what the next build would do, without doing it.
//!
//! Reads the recorded versions straight from the cache directory so that the
//! build root is never touched.

use rollover_cache::{
    decide, BlobCache, GenerationStore, LadderMetadata, RotationPlan, VersionOracle,
};
use serde::Serialize;

use crate::project::load_project;
use crate::{GlobalArgs, ReportFormat, StatusArgs};

/// Snapshot of the cache state and the pending decision.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    /// Project name from `rollover.toml`.
    pub project: String,
    /// Desired version after defaults.
    pub desired: String,
    /// Last built version after defaults.
    pub last_built: String,
    /// Recorded prior generation, if any.
    pub prior: Option<String>,
    /// Generations with a cached slot.
    pub generations: Vec<String>,
    /// Whether the live output key is cached.
    pub live_output_cached: bool,
    /// Whether the metadata key is cached.
    pub metadata_cached: bool,
    /// Whether the next build runs the build step.
    pub rebuild: bool,
    /// Reason for the decision.
    pub reason: String,
    /// Generation the next rebuild would evict.
    pub would_evict: Option<String>,
}

/// Runs the `rollover status` command. Always returns 0.
pub fn run(args: &StatusArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = load_project(global)?;
    let layout = project.layout()?;
    let cache = project.open_cache(args.cache_dir.as_deref())?;
    let desired = project.desired_version(args.desired.as_deref())?;

    let cached_metadata = cache.entry_path(&layout.metadata);
    let recorded = LadderMetadata::load(&cached_metadata)?;
    let versions = VersionOracle::resolve(desired, &recorded);
    let live_output_cached = cache.exists(&layout.live_output);
    let metadata_cached = cache.exists(&layout.metadata);
    let decision = decide(
        &versions.desired,
        &versions.last_built,
        live_output_cached,
        metadata_cached,
    );
    let would_evict = decision
        .needs_rebuild()
        .then(|| RotationPlan::for_versions(&versions))
        .and_then(|plan| plan.eviction_target().map(|t| t.to_string()));

    let report = StatusReport {
        project: project.config.project.name.clone(),
        desired: versions.desired.to_string(),
        last_built: versions.last_built.to_string(),
        prior: versions.recorded_prior.as_ref().map(|t| t.to_string()),
        generations: GenerationStore::new(&cached_metadata)
            .generations()?
            .iter()
            .map(|t| t.to_string())
            .collect(),
        live_output_cached,
        metadata_cached,
        rebuild: decision.needs_rebuild(),
        reason: decision.to_string(),
        would_evict,
    };

    match args.format {
        ReportFormat::Text => println!("{}", render_text(&report)),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(0)
}

/// Renders the report for a terminal.
fn render_text(report: &StatusReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("project:      {}\n", report.project));
    out.push_str(&format!("desired:      {}\n", report.desired));
    out.push_str(&format!("last built:   {}\n", report.last_built));
    out.push_str(&format!(
        "prior:        {}\n",
        report.prior.as_deref().unwrap_or("-")
    ));
    let generations = if report.generations.is_empty() {
        "-".to_string()
    } else {
        report.generations.join(", ")
    };
    out.push_str(&format!("generations:  {generations}\n"));
    let action = if report.rebuild { "rebuild" } else { "skip" };
    out.push_str(&format!("next build:   {action} ({})", report.reason));
    if let Some(evict) = &report.would_evict {
        out.push_str(&format!("\nwould evict:  {evict}"));
    }
    out
}
