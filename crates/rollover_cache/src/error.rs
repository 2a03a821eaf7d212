//! Error types for cache operations.

use std::path::PathBuf;

use rollover_common::ParseVersionTokenError;

/// Errors that can occur during cache operations.
///
/// Missing data is never an error here: an absent version file or an absent
/// cache entry is modelled as `None`. These variants cover an unreachable or
/// corrupt store and inputs that cannot be used at all; they propagate to the
/// caller as fatal.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The cache index could not be parsed as valid JSON.
    #[error("failed to parse cache index: {reason}")]
    IndexParse {
        /// Description of the parse failure.
        reason: String,
    },

    /// A cache entry no longer matches the digest recorded when it was stored.
    #[error("checksum mismatch for cache entry '{key}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The cache key of the corrupt entry.
        key: String,
        /// The digest recorded in the index.
        expected: String,
        /// The digest computed from the entry on disk.
        actual: String,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// A build reported success but its output directory does not exist.
    #[error("build output missing at {path}")]
    MissingBuildOutput {
        /// Where the fresh artifacts were expected.
        path: PathBuf,
    },

    /// A cache key is not a relative path below the build root.
    #[error("invalid cache key '{key}': {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A version file holds something that cannot name a generation.
    #[error("invalid version in {path}: {source}")]
    InvalidVersion {
        /// The file holding the bad token.
        path: PathBuf,
        /// The parse failure.
        source: ParseVersionTokenError,
    },
}

impl CacheError {
    /// Builds an [`CacheError::Io`] for the given path.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display() {
        let err = CacheError::Io {
            path: PathBuf::from("/tmp/cache/index.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        };
        let msg = err.to_string();
        assert!(msg.contains("cache I/O error"));
        assert!(msg.contains("index.json"));
    }

    #[test]
    fn index_parse_display() {
        let err = CacheError::IndexParse {
            reason: "unexpected EOF".to_string(),
        };
        assert!(err.to_string().contains("unexpected EOF"));
    }

    #[test]
    fn checksum_mismatch_display() {
        let err = CacheError::ChecksumMismatch {
            key: "public/dist".to_string(),
            expected: "aabb".to_string(),
            actual: "ccdd".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("checksum mismatch"));
        assert!(msg.contains("public/dist"));
        assert!(msg.contains("aabb"));
        assert!(msg.contains("ccdd"));
    }

    #[test]
    fn missing_build_output_display() {
        let err = CacheError::MissingBuildOutput {
            path: PathBuf::from("public/dist"),
        };
        assert_eq!(err.to_string(), "build output missing at public/dist");
    }

    #[test]
    fn invalid_key_display() {
        let err = CacheError::InvalidKey {
            key: "../etc".to_string(),
            reason: "escapes the build root".to_string(),
        };
        assert!(err.to_string().contains("escapes the build root"));
    }

    #[test]
    fn invalid_version_display() {
        let err = CacheError::InvalidVersion {
            path: PathBuf::from("config/assets-version"),
            source: ParseVersionTokenError {
                input: "a b".to_string(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("config/assets-version"));
        assert!(msg.contains("'a b'"));
    }
}
