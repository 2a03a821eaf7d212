//! The rebuild decision: a pure function of tokens and cache presence.

use std::fmt;

use rollover_common::VersionToken;

/// Why a rebuild is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildReason {
    /// The live output or the metadata is missing from the cache.
    ColdStart {
        /// The live output key is absent.
        live_output_missing: bool,
        /// The metadata key is absent.
        metadata_missing: bool,
    },
    /// The desired version is the force token.
    Forced,
    /// The desired version differs from the last built one.
    VersionChanged,
}

/// Outcome of the rebuild decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildDecision {
    /// Cached artifacts are valid and are loaded verbatim.
    Skip,
    /// A rebuild is required.
    Rebuild(RebuildReason),
}

impl RebuildDecision {
    /// Returns `true` if a rebuild is required.
    pub fn needs_rebuild(&self) -> bool {
        matches!(self, Self::Rebuild(_))
    }
}

impl fmt::Display for RebuildDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => f.write_str("up to date"),
            Self::Rebuild(RebuildReason::ColdStart {
                live_output_missing,
                metadata_missing,
            }) => match (*live_output_missing, *metadata_missing) {
                (true, true) => f.write_str("cold start (nothing cached)"),
                (true, false) => f.write_str("cold start (no cached output)"),
                _ => f.write_str("cold start (no cached metadata)"),
            },
            Self::Rebuild(RebuildReason::Forced) => f.write_str("forced"),
            Self::Rebuild(RebuildReason::VersionChanged) => f.write_str("version changed"),
        }
    }
}

/// Decides whether to rebuild.
///
/// Policy, in order: a missing live output or metadata entry forces a cold
/// start; the force token always rebuilds; otherwise rebuild exactly when the
/// desired and last built tokens differ.
pub fn decide(
    desired: &VersionToken,
    last_built: &VersionToken,
    live_output_exists: bool,
    metadata_exists: bool,
) -> RebuildDecision {
    if !live_output_exists || !metadata_exists {
        return RebuildDecision::Rebuild(RebuildReason::ColdStart {
            live_output_missing: !live_output_exists,
            metadata_missing: !metadata_exists,
        });
    }
    if desired.is_force() {
        return RebuildDecision::Rebuild(RebuildReason::Forced);
    }
    if desired != last_built {
        return RebuildDecision::Rebuild(RebuildReason::VersionChanged);
    }
    RebuildDecision::Skip
}

/// Boolean form of [`decide`].
pub fn needs_rebuild(
    desired: &VersionToken,
    last_built: &VersionToken,
    live_output_exists: bool,
    metadata_exists: bool,
) -> bool {
    decide(desired, last_built, live_output_exists, metadata_exists).needs_rebuild()
}
