//! Repository layer
//!
//! Persistence for job records and artifacts. The store is trait-based so
//! the orchestrator can be exercised against any backend; the filesystem
//! implementation is the only one shipped.

mod artifacts;

// Re-export trait
pub use artifacts::ArtifactStore;

// Re-export implementation and types
pub use artifacts::{
    CLAIM_FILE, DEFAULT_ARTIFACT_NAME, FsArtifactStore, METADATA_FILE, StoredArtifact,
};
