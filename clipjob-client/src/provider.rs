//! The remote side of a job, as seen by the orchestrator

use async_trait::async_trait;
use clipjob_core::domain::job::InputParams;
use clipjob_core::domain::outcome::PollOutcome;
use clipjob_core::source::ByteSource;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::ProviderClient;
use crate::error::Result;
use crate::prediction::Submission;
use crate::wait::{self, DEFAULT_POLL_INTERVAL};

/// Operations the orchestrator needs from a remote job provider
#[async_trait]
pub trait JobProvider: Send + Sync {
    /// Create a remote job; `model` is a provider model reference
    async fn submit(&self, model: &str, input: &InputParams) -> Result<Submission>;

    /// One status check, no retries
    async fn poll_once(&self, remote_id: &str) -> Result<PollOutcome>;

    /// Request cancellation of a remote job
    async fn cancel(&self, remote_id: &str) -> Result<()>;

    /// Open a stream over a finished artifact
    async fn download(&self, url: &str) -> Result<Box<dyn ByteSource>>;

    /// Pause between status checks inside [`JobProvider::wait_until_done`]
    fn poll_interval(&self) -> Duration {
        DEFAULT_POLL_INTERVAL
    }

    /// Poll until the job is terminal, the budget runs out or `cancel` fires
    async fn wait_until_done(
        &self,
        remote_id: &str,
        max_wait: Duration,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome> {
        wait::wait_until_done(self, remote_id, max_wait, cancel).await
    }
}

#[async_trait]
impl JobProvider for ProviderClient {
    async fn submit(&self, model: &str, input: &InputParams) -> Result<Submission> {
        let prediction = self.create_prediction(model, input).await?;
        Ok(Submission {
            remote_id: prediction.id,
            status: prediction.status,
        })
    }

    async fn poll_once(&self, remote_id: &str) -> Result<PollOutcome> {
        Ok(self.get_prediction(remote_id).await?.into_outcome())
    }

    async fn cancel(&self, remote_id: &str) -> Result<()> {
        self.cancel_prediction(remote_id).await
    }

    async fn download(&self, url: &str) -> Result<Box<dyn ByteSource>> {
        self.download_artifact(url).await
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}
