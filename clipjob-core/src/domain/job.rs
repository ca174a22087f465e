//! Job domain types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Provider-specific input parameters, in submission order.
pub type InputParams = serde_json::Map<String, Value>;

/// Length of a generated local id
pub const LOCAL_ID_LEN: usize = 8;

/// Opaque caller-facing identity of a job
///
/// Local ids double as directory names in the artifact store, so parsing
/// rejects anything that could escape the store root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocalId(String);

impl LocalId {
    /// Generates a fresh random local id (8 lowercase hex characters)
    pub fn generate() -> Self {
        let simple = uuid::Uuid::new_v4().simple().to_string();
        Self(simple[..LOCAL_ID_LEN].to_string())
    }

    /// Parses a caller-supplied local id
    pub fn parse(input: &str) -> Result<Self, SpecError> {
        let valid = !input.is_empty()
            && input.len() <= 64
            && input
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if valid {
            Ok(Self(input.to_string()))
        } else {
            Err(SpecError::InvalidLocalId(input.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LocalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LocalId {
    type Error = SpecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LocalId> for String {
    fn from(id: LocalId) -> Self {
        id.0
    }
}

/// Persisted job status
///
/// `Submitted` is the only non-settled value; "polling" is never stored.
/// `TimedOut` is recorded once a job outlives its deadline but is not a dead
/// end: a later `continue` still polls the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    Succeeded,
    Failed,
    Canceled,
    TimedOut,
}

impl JobStatus {
    /// Whether the status is final and must short-circuit further polling
    pub fn is_final(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Canceled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Submitted => "submitted",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
            JobStatus::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-visible job state returned by `submit` and `continue`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Submitted,
    Processing,
    Completed,
    Failed,
    Canceled,
    TimedOut,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Submitted => "submitted",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Canceled => "canceled",
            JobState::TimedOut => "timed_out",
        }
    }

    /// Whether a caller should come back later for this job
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            JobState::Submitted | JobState::Processing | JobState::TimedOut
        )
    }
}

impl From<JobStatus> for JobState {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Submitted => JobState::Submitted,
            JobStatus::Succeeded => JobState::Completed,
            JobStatus::Failed => JobState::Failed,
            JobStatus::Canceled => JobState::Canceled,
            JobStatus::TimedOut => JobState::TimedOut,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while building or validating a job specification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Parameter '{0}' must be a string, number, boolean or null")]
    NotFlat(String),

    #[error("Invalid local id: '{0}'")]
    InvalidLocalId(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Model {model} does not support {operation}")]
    UnsupportedOperation { model: String, operation: String },

    #[error("Invalid input image: {0}")]
    InvalidImage(String),
}

/// Checks that every input value is a scalar
///
/// Provider inputs are flat: nested arrays or objects are rejected before
/// anything goes over the wire.
pub fn ensure_flat(input: &InputParams) -> Result<(), SpecError> {
    match input
        .iter()
        .find(|(_, value)| matches!(value, Value::Array(_) | Value::Object(_)))
    {
        Some((key, _)) => Err(SpecError::NotFlat(key.clone())),
        None => Ok(()),
    }
}

/// A request to generate one artifact
///
/// `model` is either a catalog alias or a provider model reference
/// (`owner/name` or `owner/name:version`). Only `input` is sent to the
/// provider; the other fields are recorded locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub model: String,
    pub input: InputParams,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub input_image: Option<String>,
}

impl JobSpec {
    pub fn new(model: impl Into<String>, input: InputParams) -> Self {
        Self {
            model: model.into(),
            input,
            operation: None,
            filename: None,
            input_image: None,
        }
    }

    /// Builds a spec from one flat parameter map carrying a `model` key
    ///
    /// The `model` entry is removed from the provider input; all other keys
    /// are kept in their original order.
    pub fn from_flat(mut params: InputParams) -> Result<Self, SpecError> {
        let model = match params.remove("model") {
            Some(Value::String(model)) if !model.trim().is_empty() => model,
            Some(_) => return Err(SpecError::NotFlat("model".to_string())),
            None => return Err(SpecError::MissingParameter("model".to_string())),
        };
        ensure_flat(&params)?;
        Ok(Self::new(model, params))
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_filename(mut self, filename: Option<String>) -> Self {
        self.filename = filename.filter(|name| !name.trim().is_empty());
        self
    }

    pub fn with_input_image(mut self, path: impl Into<String>) -> Self {
        self.input_image = Some(path.into());
        self
    }

    /// The prompt, when the input carries one
    pub fn prompt(&self) -> Option<&str> {
        self.input.get("prompt").and_then(Value::as_str)
    }
}
