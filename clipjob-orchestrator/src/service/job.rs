//! Job orchestrator
//!
//! Ties a local id to a remote job, decides what each poll outcome means for
//! the persisted record, and materializes the finished artifact once.
//!
//! The record in the store is the only state. Nothing is cached between
//! calls, so `continue` behaves the same in a fresh process as in the one
//! that submitted the job.

use chrono::Utc;
use clipjob_client::{ClientError, JobProvider};
use clipjob_core::catalog;
use clipjob_core::domain::job::{JobSpec, JobState, JobStatus, LocalId, SpecError, ensure_flat};
use clipjob_core::domain::outcome::{PollOutcome, ProviderStatus};
use clipjob_core::domain::record::JobRecord;
use clipjob_core::dto::job::{JobMetrics, JobSnapshot, SubmitReceipt};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{OrchestratorError, Result};
use crate::repository::ArtifactStore;
use crate::service::media;
use crate::service::probe::MediaProbe;

/// Longest excerpt of an unexpected result kept in errors
const MAX_FOUND_LEN: usize = 200;

/// Lifecycle knobs for the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct JobPolicy {
    /// Age after which a still-running job is recorded as timed out
    pub job_deadline: Duration,
    /// Age after which an abandoned materialization claim may be taken over
    pub claim_ttl: Duration,
    /// Measure downloaded artifacts with ffprobe
    pub probe_media: bool,
}

impl Default for JobPolicy {
    fn default() -> Self {
        Self {
            job_deadline: Duration::from_secs(30 * 60),
            claim_ttl: Duration::from_secs(10 * 60),
            probe_media: true,
        }
    }
}

/// A job id resolved against the store
#[derive(Debug)]
struct ResolvedJob {
    local_id: LocalId,
    remote_id: String,
    /// Persisted record; empty when running in degraded mode
    record: JobRecord,
}

impl ResolvedJob {
    /// Update carrying only the job's identities
    ///
    /// Identities are set once, so this is a no-op on an existing record and
    /// creates the record for a job that had none.
    fn update(&self) -> JobRecord {
        JobRecord {
            local_id: Some(self.local_id.clone()),
            remote_id: Some(self.remote_id.clone()),
            ..Default::default()
        }
    }
}

/// Drives jobs from submission to a materialized artifact
pub struct JobOrchestrator {
    provider: Arc<dyn JobProvider>,
    store: Arc<dyn ArtifactStore>,
    policy: JobPolicy,
    probe: MediaProbe,
}

impl JobOrchestrator {
    pub fn new(
        provider: Arc<dyn JobProvider>,
        store: Arc<dyn ArtifactStore>,
        policy: JobPolicy,
    ) -> Self {
        Self {
            provider,
            store,
            policy,
            probe: MediaProbe::default(),
        }
    }

    /// Replace the ffprobe runner
    pub fn with_probe(mut self, probe: MediaProbe) -> Self {
        self.probe = probe;
        self
    }

    // =============================================================================
    // Public operations
    // =============================================================================

    /// Submits a job and returns both identities without waiting on it
    ///
    /// A failure to persist the record is logged and tolerated: the job can
    /// still be continued by its remote id, without its original parameters.
    pub async fn submit(&self, spec: JobSpec) -> Result<SubmitReceipt> {
        if spec.model.trim().is_empty() {
            return Err(SpecError::MissingParameter("model".to_string()).into());
        }
        ensure_flat(&spec.input)?;

        let model_id = catalog::provider_id(&spec.model);
        let local_id = self.store.allocate();

        let submission = self
            .provider
            .submit(model_id, &spec.input)
            .await
            .map_err(OrchestratorError::Submission)?;

        info!(
            "Submitted job {} as {} (model {})",
            local_id, submission.remote_id, model_id
        );

        let input_image = match spec.input_image.as_deref() {
            Some(path) => match self.store.store_input(&local_id, Path::new(path)).await {
                Ok(name) => Some(name),
                Err(e) => {
                    warn!("Could not copy input image {} for job {}: {}", path, local_id, e);
                    Some(path.to_string())
                }
            },
            None => None,
        };

        let record = JobRecord {
            local_id: Some(local_id.clone()),
            remote_id: Some(submission.remote_id.clone()),
            status: Some(JobStatus::Submitted),
            operation: spec.operation.clone(),
            model: Some(spec.model.clone()),
            model_id: Some(model_id.to_string()),
            prompt: spec.prompt().map(str::to_string),
            input_image,
            filename: spec.filename.clone(),
            parameters: Some(spec.input.clone()),
            remote_status: Some(submission.status),
            submitted_at: Some(Utc::now()),
            ..Default::default()
        };
        if let Err(e) = self.store.write_record(&local_id, record).await {
            warn!(
                "Failed to persist job {} ({}); continue it by remote id: {}",
                local_id, submission.remote_id, e
            );
        }

        Ok(SubmitReceipt {
            local_id,
            remote_id: submission.remote_id,
            status: JobState::Submitted,
        })
    }

    /// Checks on a job, waiting at most `wait` for it to finish
    ///
    /// `id` may be a local id or a remote id. A job already settled in the
    /// store is answered from the store alone.
    pub async fn continue_job(
        &self,
        id: &str,
        wait: Duration,
        cancel: &CancellationToken,
    ) -> Result<JobSnapshot> {
        let job = self.resolve(id).await?;

        if job.record.is_final() {
            debug!("Job {} already settled, answering from the store", job.local_id);
            return Ok(self.build_snapshot(&job, &job.record));
        }
        if job.record.is_empty() {
            warn!(
                "No record for {}; continuing in degraded mode as {}",
                job.remote_id, job.local_id
            );
        }

        match self
            .provider
            .wait_until_done(&job.remote_id, wait, cancel)
            .await
        {
            Ok(PollOutcome::Succeeded { output }) => self.materialize(&job, output).await,
            Ok(PollOutcome::Failed { reason }) => {
                self.settle(&job, JobStatus::Failed, ProviderStatus::Failed, Some(reason))
                    .await
            }
            Ok(PollOutcome::Canceled) => {
                self.settle(&job, JobStatus::Canceled, ProviderStatus::Canceled, None)
                    .await
            }
            Ok(PollOutcome::Running { status }) => self.still_running(&job, status).await,
            Err(ClientError::Timeout { last, polls, .. }) => {
                debug!("Job {} still running after {} poll(s)", job.remote_id, polls);
                self.still_running(&job, last.provider_status()).await
            }
            Err(ClientError::Cancelled) => {
                info!("Wait on job {} cancelled", job.remote_id);
                let mut snapshot = self.build_snapshot(&job, &job.record);
                snapshot.status = JobState::Processing;
                Ok(snapshot)
            }
            Err(e) if e.is_not_found() => Err(OrchestratorError::NotFound(job.remote_id)),
            Err(e) => Err(OrchestratorError::from_poll(e)),
        }
    }

    /// Requests cancellation of a job and records it as canceled
    pub async fn cancel(&self, id: &str) -> Result<JobSnapshot> {
        let job = self.resolve(id).await?;
        if job.record.is_final() {
            return Ok(self.build_snapshot(&job, &job.record));
        }

        self.provider.cancel(&job.remote_id).await.map_err(|e| {
            if e.is_not_found() {
                OrchestratorError::NotFound(job.remote_id.clone())
            } else {
                OrchestratorError::from_poll(e)
            }
        })?;
        info!("Cancellation requested for job {}", job.remote_id);

        if job.record.is_empty() {
            let mut snapshot = self.build_snapshot(&job, &job.record);
            snapshot.status = JobState::Canceled;
            return Ok(snapshot);
        }
        self.settle(&job, JobStatus::Canceled, ProviderStatus::Canceled, None)
            .await
    }

    /// The persisted view of a job, without contacting the provider
    pub async fn snapshot(&self, id: &str) -> Result<JobSnapshot> {
        let job = self.resolve(id).await?;
        if job.record.is_empty() {
            return Err(OrchestratorError::NotFound(id.to_string()));
        }
        Ok(self.build_snapshot(&job, &job.record))
    }

    // =============================================================================
    // Lifecycle steps
    // =============================================================================

    /// Resolves a caller id, preferring an exact local id
    async fn resolve(&self, id: &str) -> Result<ResolvedJob> {
        let id = id.trim();
        if id.is_empty() {
            return Err(OrchestratorError::NotFound(String::from("<empty id>")));
        }

        if let Ok(local_id) = LocalId::parse(id) {
            if self.store.exists(&local_id).await {
                let record = self.store.read_record(&local_id).await?;
                let remote_id = record
                    .remote_id
                    .clone()
                    .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))?;
                return Ok(ResolvedJob {
                    local_id,
                    remote_id,
                    record,
                });
            }
        }

        if let Some(local_id) = self.store.find_local_id_by_remote_id(id).await? {
            let record = self.store.read_record(&local_id).await?;
            return Ok(ResolvedJob {
                local_id,
                remote_id: id.to_string(),
                record,
            });
        }

        Ok(ResolvedJob {
            local_id: self.store.allocate(),
            remote_id: id.to_string(),
            record: JobRecord::default(),
        })
    }

    /// Records a still-running job; marks it timed out once past the deadline
    async fn still_running(&self, job: &ResolvedJob, status: ProviderStatus) -> Result<JobSnapshot> {
        let now = Utc::now();
        let overdue = job.record.submitted_at.is_some_and(|submitted| {
            (now - submitted)
                .to_std()
                .is_ok_and(|age| age > self.policy.job_deadline)
        });

        let mut update = JobRecord {
            remote_status: Some(status),
            last_checked_at: Some(now),
            ..job.update()
        };
        if overdue {
            warn!(
                "Job {} still {} past its {:?} deadline",
                job.remote_id, status, self.policy.job_deadline
            );
            update.status = Some(JobStatus::TimedOut);
        }

        let record = self.persist(&job.local_id, &job.record, update).await;
        let mut snapshot = self.build_snapshot(job, &record);
        if !record.is_final() {
            snapshot.status = if overdue {
                JobState::TimedOut
            } else {
                JobState::Processing
            };
        }
        Ok(snapshot)
    }

    /// Persists a terminal failure or cancellation
    async fn settle(
        &self,
        job: &ResolvedJob,
        status: JobStatus,
        remote_status: ProviderStatus,
        reason: Option<String>,
    ) -> Result<JobSnapshot> {
        match &reason {
            Some(reason) => warn!("Job {} {}: {}", job.remote_id, status, reason),
            None => info!("Job {} {}", job.remote_id, status),
        }

        let now = Utc::now();
        let update = JobRecord {
            status: Some(status),
            remote_status: Some(remote_status),
            error: reason,
            completed_at: Some(now),
            last_checked_at: Some(now),
            ..job.update()
        };
        let record = self.persist(&job.local_id, &job.record, update).await;
        Ok(self.build_snapshot(job, &record))
    }

    /// Downloads the result of a succeeded job, at most once
    async fn materialize(&self, job: &ResolvedJob, output: Value) -> Result<JobSnapshot> {
        let url = match output {
            Value::String(url) if !url.trim().is_empty() => url,
            other => return Err(self.reject_result(job, &other).await),
        };

        if !self
            .store
            .try_claim(&job.local_id, self.policy.claim_ttl)
            .await?
        {
            info!("Job {} is being materialized by another caller", job.local_id);
            let mut snapshot = self.build_snapshot(job, &job.record);
            snapshot.status = JobState::Processing;
            return Ok(snapshot);
        }

        let result = self.download_claimed(job, url).await;
        if let Err(e) = self.store.release_claim(&job.local_id).await {
            warn!("Failed to release claim on job {}: {}", job.local_id, e);
        }
        result
    }

    async fn download_claimed(&self, job: &ResolvedJob, url: String) -> Result<JobSnapshot> {
        // Another caller may have finished between our poll and our claim.
        let current = self.store.read_record(&job.local_id).await?;
        if current.is_final() {
            debug!("Job {} settled while claiming", job.local_id);
            return Ok(self.build_snapshot(job, &current));
        }

        let name = media::artifact_name(&url, current.filename.as_deref());
        let started = Instant::now();
        let mut source = self
            .provider
            .download(&url)
            .await
            .map_err(OrchestratorError::Download)?;
        let stored = self
            .store
            .store_artifact(&job.local_id, source.as_mut(), &name)
            .await?;
        let download_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            "Downloaded {} bytes for job {} in {} ms",
            stored.size_bytes, job.local_id, download_ms
        );

        let measured = if self.policy.probe_media {
            self.probe.measure(&stored.path).await.unwrap_or_default()
        } else {
            Default::default()
        };

        let now = Utc::now();
        let update = JobRecord {
            status: Some(JobStatus::Succeeded),
            remote_status: Some(ProviderStatus::Succeeded),
            output_url: Some(url),
            output_path: Some(stored.file_name),
            file_size: Some(stored.size_bytes),
            download_ms: Some(download_ms),
            actual_resolution: measured.resolution,
            actual_duration: measured.duration,
            completed_at: Some(now),
            last_checked_at: Some(now),
            ..job.update()
        };
        let record = self.persist(&job.local_id, &current, update).await;
        Ok(self.build_snapshot(job, &record))
    }

    /// Records a success whose output is not a single URL
    async fn reject_result(&self, job: &ResolvedJob, output: &Value) -> OrchestratorError {
        let mut found = output.to_string();
        if found.len() > MAX_FOUND_LEN {
            found = found.chars().take(MAX_FOUND_LEN).collect::<String>() + "...";
        }
        error!("Job {} succeeded with a malformed result: {}", job.remote_id, found);

        let now = Utc::now();
        let update = JobRecord {
            status: Some(JobStatus::Failed),
            remote_status: Some(ProviderStatus::Succeeded),
            error: Some(format!("malformed result: expected a single URL, found {}", found)),
            completed_at: Some(now),
            last_checked_at: Some(now),
            ..job.update()
        };
        self.persist(&job.local_id, &job.record, update).await;

        OrchestratorError::MalformedResult {
            remote_id: job.remote_id.clone(),
            found,
        }
    }

    /// Writes `update`, falling back to an in-memory merge when the store fails
    async fn persist(&self, id: &LocalId, current: &JobRecord, update: JobRecord) -> JobRecord {
        match self.store.write_record(id, update.clone()).await {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    "Failed to update record for job {}; this result is not durable: {}",
                    id, e
                );
                let mut record = current.clone();
                record.merge(update);
                record
            }
        }
    }

    fn build_snapshot(&self, job: &ResolvedJob, record: &JobRecord) -> JobSnapshot {
        let status = record
            .status
            .map(JobState::from)
            .unwrap_or(JobState::Processing);

        let result_path = record
            .output_path
            .as_ref()
            .map(|name| self.store.job_dir(&job.local_id).join(name));

        let metrics = record.file_size.map(|size_bytes| JobMetrics {
            size_bytes,
            download_ms: record.download_ms,
            generation_secs: match (record.submitted_at, record.completed_at) {
                (Some(submitted), Some(completed)) if completed > submitted => {
                    Some((completed - submitted).num_milliseconds() as f64 / 1000.0)
                }
                _ => None,
            },
            resolution: record.effective_resolution(),
            duration_secs: record.effective_duration(),
        });

        JobSnapshot {
            local_id: job.local_id.clone(),
            remote_id: job.remote_id.clone(),
            status,
            result_path,
            metrics,
            error: record.error.clone(),
            model: record.model.clone(),
            prompt: record.prompt.clone(),
            parameters: record.parameters.clone().unwrap_or_default(),
        }
    }
}
