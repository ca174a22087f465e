//! Provider status and poll outcomes

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Job status as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    /// Any status this client does not know; treated as still running
    #[serde(other)]
    Unknown,
}

impl ProviderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProviderStatus::Succeeded | ProviderStatus::Failed | ProviderStatus::Canceled
        )
    }
}

impl std::fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderStatus::Starting => "starting",
            ProviderStatus::Processing => "processing",
            ProviderStatus::Succeeded => "succeeded",
            ProviderStatus::Failed => "failed",
            ProviderStatus::Canceled => "canceled",
            ProviderStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Result of one provider status check
///
/// Transient: it drives the orchestrator's state transition and is never
/// persisted as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Running { status: ProviderStatus },
    Succeeded { output: Value },
    Failed { reason: String },
    Canceled,
}

impl PollOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollOutcome::Running { .. })
    }

    pub fn provider_status(&self) -> ProviderStatus {
        match self {
            PollOutcome::Running { status } => *status,
            PollOutcome::Succeeded { .. } => ProviderStatus::Succeeded,
            PollOutcome::Failed { .. } => ProviderStatus::Failed,
            PollOutcome::Canceled => ProviderStatus::Canceled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_status_is_not_terminal() {
        let status: ProviderStatus = serde_json::from_str("\"queued\"").unwrap();
        assert_eq!(status, ProviderStatus::Unknown);
        assert!(!status.is_terminal());
    }

    #[test]
    fn test_outcome_terminality() {
        let running = PollOutcome::Running {
            status: ProviderStatus::Processing,
        };
        assert!(!running.is_terminal());
        assert!(PollOutcome::Canceled.is_terminal());
        assert_eq!(
            PollOutcome::Failed {
                reason: "boom".into()
            }
            .provider_status(),
            ProviderStatus::Failed
        );
    }
}
