//! Versioned, generation-rotating artifact cache.
//!
//! Decides before a costly build whether cached artifacts are still valid and,
//! when a rebuild happens, merges the new generation of artifacts with the
//! previous one so that names from either generation keep resolving while
//! clients roll over. At most three generations (`now`, `last`, `older`) are
//! known at any time; `older` is only ever evicted.
//!
//! The blob cache and the build tool are external collaborators reached through
//! the [`BlobCache`] and [`BuildInvoker`] traits.

#![warn(missing_docs)]

pub mod artifact;
pub mod blob;
pub mod decision;
pub mod dir_cache;
pub mod error;
pub mod fallback;
pub mod generation;
pub mod index;
pub mod invoker;
pub mod metadata;
pub mod oracle;
pub mod pipeline;
pub mod rotator;
pub mod tree;

pub use artifact::ArtifactSet;
pub use blob::{BlobCache, CacheKey};
pub use decision::{decide, needs_rebuild, RebuildDecision, RebuildReason};
pub use dir_cache::{DirCache, EntryHealth};
pub use error::CacheError;
pub use fallback::{DegradedReport, FallbackPolicy};
pub use generation::GenerationStore;
pub use invoker::{BuildInvoker, BuildOutcome, CommandInvoker};
pub use metadata::LadderMetadata;
pub use oracle::{read_desired_version, ResolvedVersions, VersionOracle};
pub use pipeline::{CacheLayout, Pipeline, PipelineOutcome};
pub use rotator::{GenerationRotator, RotationKind, RotationPlan, RotationReport};
