//! Error types for the provider client

use clipjob_core::domain::outcome::PollOutcome;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the provider
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure; safe to retry by polling again later
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider rejected a job submission
    #[error("Submission rejected (status {status}): {message}")]
    Submission {
        /// HTTP status code
        status: u16,
        /// Response body from the provider
        message: String,
    },

    /// The provider refused the submission for payment or quota reasons
    #[error("Billing issue: {detail}")]
    Billing {
        /// Provider's detail string, verbatim
        detail: String,
    },

    /// The provider answered with an unauthorized or otherwise unusable response
    #[error("Provider error (status {status}): {message}")]
    Remote {
        /// HTTP status code
        status: u16,
        /// Response body from the provider
        message: String,
    },

    /// Failed to parse a provider response
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The job input is not a flat provider-shaped mapping
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The wait budget ran out while the job was still running
    #[error("Timed out after {waited:?} waiting for the job ({polls} polls)")]
    Timeout {
        /// Time spent waiting
        waited: Duration,
        /// Number of status checks performed
        polls: u32,
        /// Last observed still-running outcome
        last: Box<PollOutcome>,
    },

    /// The caller cancelled the wait
    #[error("Wait cancelled by caller")]
    Cancelled,

    /// Fetching the result artifact failed
    #[error("Download failed (status {status}): {message}")]
    Download {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },
}

impl ClientError {
    /// Create a remote error from status code and message
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// Check if this is a billing failure
    pub fn is_billing(&self) -> bool {
        matches!(self, Self::Billing { .. })
    }

    /// Check if the wait budget ran out (the job itself may still succeed)
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if retrying the same call later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout { .. } | Self::Cancelled => true,
            Self::Remote { status, .. } | Self::Download { status, .. } => {
                *status == 429 || *status >= 500
            }
            _ => false,
        }
    }

    /// Check if the provider does not know the requested job
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Remote { status: 404, .. })
    }
}
