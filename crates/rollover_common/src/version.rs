//! Version tokens naming artifact generations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An opaque identifier for one build's input state.
///
/// Tokens are compared by exact string equality. They double as directory
/// names for generation slots, so a token is a single non-empty path segment
/// without whitespace. The literal [`VersionToken::FORCE`] is reserved: it
/// requests a rebuild that does not advance the generation ladder.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionToken(String);

impl VersionToken {
    /// The reserved force-rebuild token.
    pub const FORCE: &'static str = "FORCE";

    /// Default used when no desired version is configured.
    pub const DEFAULT_DESIRED: &'static str = "1";

    /// Default used when the cache has no recorded build.
    pub const DEFAULT_LAST_BUILT: &'static str = "0";

    /// Creates a token, validating that it is a usable path segment.
    pub fn new(raw: impl Into<String>) -> Result<Self, ParseVersionTokenError> {
        let raw = raw.into();
        let invalid = raw.is_empty()
            || raw == "."
            || raw == ".."
            || raw
                .chars()
                .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control());
        if invalid {
            return Err(ParseVersionTokenError { input: raw });
        }
        Ok(Self(raw))
    }

    /// The default desired version, `"1"`.
    pub fn default_desired() -> Self {
        Self(Self::DEFAULT_DESIRED.to_string())
    }

    /// The default last-built version, `"0"`.
    pub fn default_last_built() -> Self {
        Self(Self::DEFAULT_LAST_BUILT.to_string())
    }

    /// The force-rebuild token.
    pub fn force() -> Self {
        Self(Self::FORCE.to_string())
    }

    /// Returns `true` if this is the reserved force-rebuild token.
    pub fn is_force(&self) -> bool {
        self.0 == Self::FORCE
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the numeric value of the token, if it is an integer.
    pub fn as_number(&self) -> Option<i64> {
        self.0.parse().ok()
    }

    /// Returns the token one numeric step back, or `None` if the token is
    /// not an integer (or stepping back would overflow).
    ///
    /// `"7"` yields `"6"`, `"0"` yields `"-1"`, `"abc123"` yields `None`.
    pub fn predecessor(&self) -> Option<Self> {
        let n = self.as_number()?.checked_sub(1)?;
        Some(Self(n.to_string()))
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionToken({})", self.0)
    }
}

impl FromStr for VersionToken {
    type Err = ParseVersionTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

impl TryFrom<String> for VersionToken {
    type Error = ParseVersionTokenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VersionToken> for String {
    fn from(token: VersionToken) -> Self {
        token.0
    }
}

impl PartialEq<str> for VersionToken {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for VersionToken {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Error type for strings that cannot name a generation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version token: '{input}'")]
pub struct ParseVersionTokenError {
    /// The input string that failed to parse.
    pub input: String,
}
