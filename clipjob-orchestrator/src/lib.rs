//! Clipjob Orchestrator
//!
//! The asynchronous job lifecycle manager: submits generation jobs to a
//! remote provider, correlates them with local storage, waits on them in
//! bounded windows and materializes each finished artifact exactly once.
//!
//! Architecture:
//! - Configuration: settings from the environment or defaults
//! - Repository: the artifact store (job records and files, keyed by local id)
//! - Service: the job orchestrator and its media helpers

pub mod config;
pub mod error;
pub mod repository;
pub mod service;

pub use config::Config;
pub use error::{OrchestratorError, Result, StoreError};
pub use repository::{ArtifactStore, FsArtifactStore};
pub use service::{JobOrchestrator, JobPolicy};
