//! Bounded waiting on a remote job
//!
//! The loop polls once immediately, then sleeps for the provider's poll
//! interval between checks. It never sleeps past the deadline, so the total
//! time spent is at most `max_wait` plus one status request.

use clipjob_core::domain::outcome::PollOutcome;
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::provider::JobProvider;

/// Pause between status checks unless a provider says otherwise
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Poll `remote_id` until it is terminal or `max_wait` elapses
///
/// # Errors
/// * [`ClientError::Timeout`] with the last running outcome when the budget runs out
/// * [`ClientError::Cancelled`] when `cancel` fires
/// * any error from a status check, unchanged
pub async fn wait_until_done<P>(
    provider: &P,
    remote_id: &str,
    max_wait: Duration,
    cancel: &CancellationToken,
) -> Result<PollOutcome>
where
    P: JobProvider + ?Sized,
{
    let interval = provider.poll_interval();
    let started = Instant::now();
    let deadline = started + max_wait;
    let mut polls: u32 = 0;

    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            outcome = provider.poll_once(remote_id) => outcome?,
        };
        polls += 1;

        if outcome.is_terminal() {
            debug!(
                "Job {} reached {} after {} poll(s)",
                remote_id,
                outcome.provider_status(),
                polls
            );
            return Ok(outcome);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(ClientError::Timeout {
                waited: now - started,
                polls,
                last: Box::new(outcome),
            });
        }

        debug!(
            "Job {} still {} after {} poll(s)",
            remote_id,
            outcome.provider_status(),
            polls
        );

        let wake = (now + interval).min(deadline);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            _ = time::sleep_until(wake) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::Submission;
    use async_trait::async_trait;
    use clipjob_core::domain::job::InputParams;
    use clipjob_core::domain::outcome::ProviderStatus;
    use clipjob_core::source::ByteSource;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Replays a fixed list of outcomes, repeating the last one forever
    struct Scripted {
        outcomes: Mutex<VecDeque<PollOutcome>>,
        polls: AtomicU32,
    }

    impl Scripted {
        fn new(outcomes: Vec<PollOutcome>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                polls: AtomicU32::new(0),
            }
        }
    }

    fn running() -> PollOutcome {
        PollOutcome::Running {
            status: ProviderStatus::Processing,
        }
    }

    #[async_trait]
    impl JobProvider for Scripted {
        async fn submit(&self, _model: &str, _input: &InputParams) -> Result<Submission> {
            unreachable!()
        }

        async fn poll_once(&self, _remote_id: &str) -> Result<PollOutcome> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.len() > 1 {
                Ok(outcomes.pop_front().unwrap())
            } else {
                Ok(outcomes.front().cloned().unwrap())
            }
        }

        async fn cancel(&self, _remote_id: &str) -> Result<()> {
            Ok(())
        }

        async fn download(&self, _url: &str) -> Result<Box<dyn ByteSource>> {
            unreachable!()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_terminal_outcome() {
        let provider = Scripted::new(vec![
            running(),
            running(),
            PollOutcome::Succeeded {
                output: json!("https://cdn.example.com/out.mp4"),
            },
        ]);

        let outcome = provider
            .wait_until_done("pred-1", Duration::from_secs(30), &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome, PollOutcome::Succeeded { .. }));
        assert_eq!(provider.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_within_budget() {
        let provider = Scripted::new(vec![running()]);
        let started = Instant::now();

        let err = provider
            .wait_until_done("pred-1", Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap_err();

        let elapsed = started.elapsed();
        assert!(elapsed <= Duration::from_secs(5));
        match err {
            ClientError::Timeout { polls, last, .. } => {
                // t = 0, 2, 4, 5
                assert_eq!(polls, 4);
                assert_eq!(*last, running());
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_budget_polls_once() {
        let provider = Scripted::new(vec![running()]);

        let err = provider
            .wait_until_done("pred-1", Duration::ZERO, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(provider.polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_the_wait() {
        let provider = Scripted::new(vec![running()]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        tokio::spawn(async move {
            time::sleep(Duration::from_secs(3)).await;
            trigger.cancel();
        });

        let err = provider
            .wait_until_done("pred-1", Duration::from_secs(60), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Cancelled));
        assert_eq!(provider.polls.load(Ordering::SeqCst), 2);
    }
}
