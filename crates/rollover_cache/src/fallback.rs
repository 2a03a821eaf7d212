//! Failure handling: a failed build leaves every cached artifact in place.

use std::fmt;

use rollover_common::VersionToken;
use tracing::warn;

use crate::oracle::ResolvedVersions;

/// Signal that the build failed and artifacts must be resolved some other way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradedReport {
    /// Why the build failed.
    pub reason: String,
    /// Version that was being built.
    pub desired: VersionToken,
    /// Version still recorded as built.
    pub last_built: VersionToken,
}

impl fmt::Display for DegradedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "build of version {} failed ({}); version {} remains recorded",
            self.desired, self.reason, self.last_built
        )
    }
}

/// Decides what a failed build means for the cache: nothing is touched.
pub struct FallbackPolicy;

impl FallbackPolicy {
    /// Records a build failure and returns the degraded signal for the caller.
    ///
    /// The live output, the generation ladder, and the recorded tokens are all
    /// left as they were before the attempt.
    pub fn on_failure(reason: impl Into<String>, versions: &ResolvedVersions) -> DegradedReport {
        let reason = reason.into();
        warn!(
            desired = %versions.desired,
            last_built = %versions.last_built,
            reason = %reason,
            "build failed, keeping cached artifacts and engaging fallback"
        );
        DegradedReport {
            reason,
            desired: versions.desired.clone(),
            last_built: versions.last_built.clone(),
        }
    }
}
