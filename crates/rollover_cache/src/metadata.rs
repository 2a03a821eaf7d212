//! Recorded ladder tokens inside the metadata directory.
//!
//! Two newline-terminated files hold the token of the current generation and
//! of the generation built immediately before it. Either file may be absent;
//! absence is a value, not an error.

use std::path::Path;

use rollover_common::VersionToken;
use tracing::warn;

use crate::error::CacheError;

/// File holding the current generation's token.
const CURRENT_FILE: &str = "version";

/// File holding the previous generation's token.
const PRIOR_FILE: &str = "prior_version";

/// Tokens recorded by the last completed rotation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LadderMetadata {
    /// Token of the newest generation.
    pub current: Option<VersionToken>,
    /// Token of the generation before it.
    pub prior: Option<VersionToken>,
}

impl LadderMetadata {
    /// Reads both tokens from `dir`.
    ///
    /// A missing or blank file yields `None`. A file that does not hold a
    /// usable token is also treated as absent, so the next decision falls
    /// back to a rebuild rather than trusting it.
    pub fn load(dir: &Path) -> Result<Self, CacheError> {
        Ok(Self {
            current: read_recorded(&dir.join(CURRENT_FILE))?,
            prior: read_recorded(&dir.join(PRIOR_FILE))?,
        })
    }

    /// Writes the tokens to `dir`, creating it if needed. Without a prior
    /// token any previously recorded one is removed.
    ///
    /// The current token is written last.
    pub fn save(
        dir: &Path,
        current: &VersionToken,
        prior: Option<&VersionToken>,
    ) -> Result<(), CacheError> {
        std::fs::create_dir_all(dir).map_err(|e| CacheError::io(dir, e))?;
        let prior_path = dir.join(PRIOR_FILE);
        match prior {
            Some(prior) => write_token(&prior_path, prior)?,
            None => match std::fs::remove_file(&prior_path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(CacheError::io(&prior_path, e)),
            },
        }
        write_token(&dir.join(CURRENT_FILE), current)
    }
}

/// Reads a single-token file. `Ok(None)` if the file is missing or blank.
pub(crate) fn read_token_file(path: &Path) -> Result<Option<String>, CacheError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let trimmed = content.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CacheError::io(path, e)),
    }
}

fn read_recorded(path: &Path) -> Result<Option<VersionToken>, CacheError> {
    let Some(raw) = read_token_file(path)? else {
        return Ok(None);
    };
    match VersionToken::new(raw) {
        Ok(token) => Ok(Some(token)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable recorded version");
            Ok(None)
        }
    }
}

fn write_token(path: &Path, token: &VersionToken) -> Result<(), CacheError> {
    std::fs::write(path, format!("{token}\n")).map_err(|e| CacheError::io(path, e))
}
