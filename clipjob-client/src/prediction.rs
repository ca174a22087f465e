//! Provider wire types

use clipjob_core::domain::job::InputParams;
use clipjob_core::domain::outcome::{PollOutcome, ProviderStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Body of `POST /predictions` and `POST /models/{id}/predictions`
#[derive(Debug, Clone, Serialize)]
pub struct CreatePrediction<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<&'a str>,
    pub input: &'a InputParams,
}

/// A prediction as returned by every prediction endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: ProviderStatus,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub error: Value,
    #[serde(default)]
    pub logs: Option<String>,
    #[serde(default)]
    pub urls: HashMap<String, String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub metrics: Option<Value>,
}

/// Identity and initial status of a freshly created job
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub remote_id: String,
    pub status: ProviderStatus,
}

impl Prediction {
    /// Converts the provider's view into a poll outcome
    pub fn into_outcome(self) -> PollOutcome {
        match self.status {
            ProviderStatus::Succeeded => PollOutcome::Succeeded {
                output: self.output,
            },
            ProviderStatus::Failed => PollOutcome::Failed {
                reason: extract_error_message(&self.error)
                    .unwrap_or_else(|| "prediction failed".to_string()),
            },
            ProviderStatus::Canceled => PollOutcome::Canceled,
            status => PollOutcome::Running { status },
        }
    }
}

/// Extracts a failure message from a provider error payload
///
/// The provider reports errors either as a bare string or as an object with
/// a `message` field; both are accepted.
pub fn extract_error_message(error: &Value) -> Option<String> {
    match error {
        Value::Null => None,
        Value::String(message) if message.is_empty() => None,
        Value::String(message) => Some(message.clone()),
        Value::Object(fields) => match fields.get("message") {
            Some(Value::String(message)) => Some(message.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        },
        other => Some(other.to_string()),
    }
}

/// Extracts the `detail` string of a provider error body, if any
pub(crate) fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("detail")
        .and_then(Value::as_str)
        .map(str::to_string)
}
