//! Service layer
//!
//! Business logic for the job lifecycle. The orchestrator drives jobs
//! through the provider and the artifact store; the remaining modules are
//! helpers it relies on for media handling.

mod job;
pub mod media;
pub mod probe;

pub use job::{JobOrchestrator, JobPolicy};
pub use probe::{MediaInfo, MediaProbe};
