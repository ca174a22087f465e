//! Persisted job record
//!
//! A record is written at submission and then updated incrementally over the
//! job's lifetime. Updates are partial: every field is optional and
//! [`JobRecord::merge`] only overlays the fields an update carries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::job::{InputParams, JobStatus, LocalId};
use super::outcome::ProviderStatus;

/// Current on-disk record layout
pub const RECORD_VERSION: u32 = 1;

/// Durable metadata describing one job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(default)]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<LocalId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Model as the caller named it (alias or provider reference)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Provider model reference actually submitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<InputParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_status: Option<ProviderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    /// Artifact file name, relative to the job directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Provider-specific fields this version does not model
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn overlay<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

fn overlay_once<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

impl JobRecord {
    /// True when nothing has been persisted for this job
    pub fn is_empty(&self) -> bool {
        *self == JobRecord::default()
    }

    /// Whether the record holds a final status
    pub fn is_final(&self) -> bool {
        self.status.is_some_and(JobStatus::is_final)
    }

    /// Overlays the fields carried by `update`
    ///
    /// Identity and result fields (`local_id`, `remote_id`, `submitted_at`,
    /// `output_url`, `output_path`) are set once and never replaced. A final
    /// status is never replaced either, and result fields are only accepted
    /// together with a `succeeded` status.
    pub fn merge(&mut self, update: JobRecord) {
        let JobRecord {
            version: _,
            local_id,
            remote_id,
            status,
            operation,
            model,
            model_id,
            prompt,
            input_image,
            filename,
            parameters,
            remote_status,
            submitted_at,
            last_checked_at,
            completed_at,
            output_url,
            output_path,
            file_size,
            download_ms,
            actual_resolution,
            actual_duration,
            error,
            extra,
        } = update;

        let was_final = self.is_final();

        overlay_once(&mut self.local_id, local_id);
        overlay_once(&mut self.remote_id, remote_id);
        overlay_once(&mut self.submitted_at, submitted_at);

        overlay(&mut self.operation, operation);
        overlay(&mut self.model, model);
        overlay(&mut self.model_id, model_id);
        overlay(&mut self.prompt, prompt);
        overlay(&mut self.input_image, input_image);
        overlay(&mut self.filename, filename);
        overlay(&mut self.parameters, parameters);
        overlay(&mut self.remote_status, remote_status);
        overlay(&mut self.last_checked_at, last_checked_at);
        self.extra.extend(extra);

        if was_final {
            return;
        }

        overlay(&mut self.status, status);
        overlay(&mut self.completed_at, completed_at);
        overlay(&mut self.error, error);

        if status == Some(JobStatus::Succeeded) {
            overlay_once(&mut self.output_url, output_url);
            overlay_once(&mut self.output_path, output_path);
            overlay(&mut self.file_size, file_size);
            overlay(&mut self.download_ms, download_ms);
            overlay(&mut self.actual_resolution, actual_resolution);
            overlay(&mut self.actual_duration, actual_duration);
        }
    }

    /// Resolution of the artifact, preferring the measured value
    pub fn effective_resolution(&self) -> Option<String> {
        self.actual_resolution.clone().or_else(|| {
            self.requested("resolution")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    }

    /// Duration of the artifact in seconds, preferring the measured value
    pub fn effective_duration(&self) -> Option<f64> {
        self.actual_duration
            .filter(|d| *d > 0.0)
            .or_else(|| self.requested("duration").and_then(Value::as_f64))
    }

    fn requested(&self, key: &str) -> Option<&Value> {
        self.parameters.as_ref().and_then(|params| params.get(key))
    }
}
