//! Orchestrator and store error types

use clipjob_client::ClientError;
use clipjob_core::domain::job::SpecError;
use thiserror::Error;

/// Errors raised by the artifact store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize job record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors surfaced by the job orchestrator
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The job spec was rejected before anything was sent
    #[error("Invalid job spec: {0}")]
    InvalidSpec(#[from] SpecError),

    /// The provider rejected the submission; billing failures stay detectable
    #[error("Submission failed: {0}")]
    Submission(#[source] ClientError),

    /// Transport-level failure or an interrupted wait; retry with `continue`
    #[error("Transient provider error: {0}")]
    Transient(#[source] ClientError),

    /// The provider answered with an unusable or unauthorized response
    #[error("Provider error: {0}")]
    Remote(#[source] ClientError),

    /// The provider reported success with an output that is not one URL
    #[error("Job {remote_id} succeeded with a malformed result: {found}")]
    MalformedResult { remote_id: String, found: String },

    /// Neither a local nor a remote job matches the id
    #[error("Job not found: {0}")]
    NotFound(String),

    /// The finished artifact could not be fetched
    #[error("Artifact download failed: {0}")]
    Download(#[source] ClientError),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl OrchestratorError {
    /// Whether the provider refused the submission for payment or quota reasons
    pub fn is_billing(&self) -> bool {
        matches!(self, Self::Submission(err) if err.is_billing())
    }

    /// Whether re-invoking `continue` later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transient(_) | Self::Download(_) | Self::Storage(_) => true,
            Self::Remote(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Classify a provider error raised while checking on a job
    pub(crate) fn from_poll(err: ClientError) -> Self {
        if err.is_transient() {
            Self::Transient(err)
        } else {
            Self::Remote(err)
        }
    }
}

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_billing_survives_wrapping() {
        let err = OrchestratorError::Submission(ClientError::Billing {
            detail: "Monthly spend limit reached".into(),
        });
        assert!(err.is_billing());
        assert!(err.to_string().contains("Monthly spend limit reached"));

        let err = OrchestratorError::Submission(ClientError::Submission {
            status: 422,
            message: "bad".into(),
        });
        assert!(!err.is_billing());
    }

    #[test]
    fn test_poll_errors_are_classified() {
        assert!(matches!(
            OrchestratorError::from_poll(ClientError::remote(503, "busy")),
            OrchestratorError::Transient(_)
        ));
        assert!(matches!(
            OrchestratorError::from_poll(ClientError::remote(401, "denied")),
            OrchestratorError::Remote(_)
        ));
        assert!(OrchestratorError::NotFound("x".into()).to_string().contains("x"));
    }
}
