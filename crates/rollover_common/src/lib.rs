//! Shared foundational types used across the rollover workspace.
//!
//! This crate provides the typed version identifier that names artifact
//! generations and the content hash used to fingerprint cache entries.

#![warn(missing_docs)]

pub mod hash;
pub mod version;

pub use hash::{ContentHash, ContentHasher};
pub use version::{ParseVersionTokenError, VersionToken};
