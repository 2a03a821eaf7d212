//! Resolution of the desired and last-built version tokens.

use std::path::Path;

use rollover_common::VersionToken;

use crate::error::CacheError;
use crate::metadata::{read_token_file, LadderMetadata};

/// The version tokens a run works with, defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersions {
    /// Desired version, `"1"` when none is configured.
    pub desired: VersionToken,
    /// Last built version, `"0"` when the cache records none.
    pub last_built: VersionToken,
    /// Generation recorded before `last_built`, if any.
    pub recorded_prior: Option<VersionToken>,
}

/// Resolves version tokens from explicit inputs. Never mutates state.
pub struct VersionOracle;

impl VersionOracle {
    /// Applies the documented defaults to the configured and recorded tokens.
    pub fn resolve(desired: Option<VersionToken>, recorded: &LadderMetadata) -> ResolvedVersions {
        ResolvedVersions {
            desired: desired.unwrap_or_else(VersionToken::default_desired),
            last_built: recorded
                .current
                .clone()
                .unwrap_or_else(VersionToken::default_last_built),
            recorded_prior: recorded.prior.clone(),
        }
    }
}

/// Reads the configured desired version from a single-token file.
///
/// A missing or blank file yields `Ok(None)`. A file holding something that
/// cannot name a generation is an error: it is user input, not absence.
pub fn read_desired_version(path: &Path) -> Result<Option<VersionToken>, CacheError> {
    let Some(raw) = read_token_file(path)? else {
        return Ok(None);
    };
    VersionToken::new(raw)
        .map(Some)
        .map_err(|source| CacheError::InvalidVersion {
            path: path.to_path_buf(),
            source,
        })
}
