//! Single-in-flight FIFO drain of the offline queue.
//!
//! Transient failures back off exponentially and retry without bound;
//! the retention cap in the queue is the only thing that drops work.
//! Definitive rejections park the item, and a rejected credential halts
//! the drain entirely until the operator re-registers.

use async_trait::async_trait;
use printwatch_common::jobs::PrintJobPayload;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::agent_modules::api_client::{ApiClient, SubmitOutcome};
use crate::agent_modules::queue::{OfflineQueue, QueueError};

pub const DEFAULT_RETRY_DELAY_SECONDS: u64 = 5;
pub const MAX_RETRY_DELAY_SECONDS: u64 = 60 * 5;

/// Transport seam; the real implementation is [`ApiClient`].
#[async_trait]
pub trait SubmitApi: Send + Sync {
    async fn submit(&self, payload: &PrintJobPayload) -> SubmitOutcome;
}

#[async_trait]
impl SubmitApi for ApiClient {
    async fn submit(&self, payload: &PrintJobPayload) -> SubmitOutcome {
        ApiClient::submit(self, payload).await
    }
}

/// Exponential backoff doubling from the default delay up to the cap.
#[derive(Debug)]
pub struct Backoff {
    current: Duration,
}

impl Backoff {
    pub fn new() -> Backoff {
        Backoff {
            current: Duration::from_secs(DEFAULT_RETRY_DELAY_SECONDS),
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(Duration::from_secs(MAX_RETRY_DELAY_SECONDS));
        delay
    }

    pub fn reset(&mut self) {
        self.current = Duration::from_secs(DEFAULT_RETRY_DELAY_SECONDS);
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::new()
    }
}

/// What one drain step decided; `run` turns this into sleeps.
#[derive(Debug, PartialEq)]
pub enum DrainStep {
    Idle,
    Delivered { queue_id: i64 },
    Terminal { queue_id: i64 },
    Unauthorized,
    Retry { delay: Duration },
}

pub struct Uploader<A: SubmitApi> {
    queue: OfflineQueue,
    api: A,
    backoff: Backoff,
    idle_poll: Duration,
}

impl<A: SubmitApi> Uploader<A> {
    pub fn new(queue: OfflineQueue, api: A, idle_poll: Duration) -> Uploader<A> {
        Uploader {
            queue,
            api,
            backoff: Backoff::new(),
            idle_poll,
        }
    }

    /// Claims and resolves at most one item.
    pub async fn run_once(&mut self) -> Result<DrainStep, QueueError> {
        let Some(job) = self.queue.next_pending().await? else {
            return Ok(DrainStep::Idle);
        };

        match self.api.submit(&job.payload).await {
            SubmitOutcome::Accepted { job_id } => {
                self.queue.acknowledge(job.id).await?;
                self.backoff.reset();
                debug!(
                    queue_id = job.id,
                    job_id,
                    document = %job.payload.document_name,
                    "Delivered print job."
                );
                Ok(DrainStep::Delivered { queue_id: job.id })
            }
            SubmitOutcome::Duplicate { job_id } => {
                self.queue.acknowledge(job.id).await?;
                self.backoff.reset();
                info!(
                    queue_id = job.id,
                    job_id = ?job_id,
                    "Server already held this submission; treating as delivered."
                );
                Ok(DrainStep::Delivered { queue_id: job.id })
            }
            SubmitOutcome::Rejected { message } => {
                self.queue.mark_failed_permanent(job.id, &message).await?;
                self.backoff.reset();
                warn!(
                    queue_id = job.id,
                    document = %job.payload.document_name,
                    reason = %message,
                    "Server rejected print job; it will not be retried."
                );
                Ok(DrainStep::Terminal { queue_id: job.id })
            }
            SubmitOutcome::Unauthorized => {
                self.queue.release(job.id).await?;
                Ok(DrainStep::Unauthorized)
            }
            SubmitOutcome::Transient { message } => {
                self.queue.record_attempt(job.id, &message).await?;
                self.queue.release(job.id).await?;
                let delay = self.backoff.next_delay();
                warn!(
                    queue_id = job.id,
                    attempts = job.attempts + 1,
                    retry_in_seconds = delay.as_secs(),
                    reason = %message,
                    "Submission failed; will retry."
                );
                Ok(DrainStep::Retry { delay })
            }
        }
    }

    /// Drains until the credential is rejected. Queueing continues
    /// elsewhere regardless; this only stops the upload side.
    pub async fn run(mut self) {
        info!("Queue drain started.");
        loop {
            match self.run_once().await {
                Ok(DrainStep::Idle) => sleep(self.idle_poll).await,
                Ok(DrainStep::Delivered { .. }) | Ok(DrainStep::Terminal { .. }) => {}
                Ok(DrainStep::Unauthorized) => {
                    error!(
                        "API key rejected by the server. Halting queue drain; \
                         re-register the agent to resume."
                    );
                    return;
                }
                Ok(DrainStep::Retry { delay }) => sleep(delay).await,
                Err(e) => {
                    error!(error = %e, "Queue error during drain.");
                    sleep(self.idle_poll).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use printwatch_common::jobs::JobStatus;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use uuid::Uuid;

    fn payload(document: &str) -> PrintJobPayload {
        PrintJobPayload {
            submission_id: Uuid::new_v4(),
            username: "jdoe".to_string(),
            computer_name: "PC-042".to_string(),
            printer_name: "HQ-Laser-1".to_string(),
            printer_ip: None,
            document_name: document.to_string(),
            pages: 1,
            copies: 1,
            is_color: false,
            is_duplex: false,
            status: JobStatus::Completed,
            print_time: Utc::now(),
        }
    }

    /// Scripted transport: pops one outcome per call and records the
    /// documents it was asked to submit.
    struct FakeApi {
        script: Mutex<VecDeque<SubmitOutcome>>,
        submitted: Mutex<Vec<String>>,
    }

    impl FakeApi {
        fn new(script: Vec<SubmitOutcome>) -> FakeApi {
            FakeApi {
                script: Mutex::new(script.into()),
                submitted: Mutex::new(Vec::new()),
            }
        }

        fn submitted(&self) -> Vec<String> {
            self.submitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SubmitApi for &FakeApi {
        async fn submit(&self, payload: &PrintJobPayload) -> SubmitOutcome {
            self.submitted
                .lock()
                .unwrap()
                .push(payload.document_name.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(SubmitOutcome::Transient {
                    message: "script exhausted".to_string(),
                })
        }
    }

    async fn queue_with(documents: &[&str]) -> OfflineQueue {
        let queue = OfflineQueue::open_in_memory().await.unwrap();
        for document in documents {
            queue.enqueue(&payload(document)).await.unwrap();
        }
        queue
    }

    #[tokio::test]
    async fn replays_in_enqueue_order_after_outage() {
        let queue = queue_with(&["one.pdf", "two.pdf", "three.pdf"]).await;
        let api = FakeApi::new(vec![
            // Server unreachable twice, then connectivity returns.
            SubmitOutcome::Transient {
                message: "connection refused".to_string(),
            },
            SubmitOutcome::Transient {
                message: "connection refused".to_string(),
            },
            SubmitOutcome::Accepted { job_id: 1 },
            SubmitOutcome::Accepted { job_id: 2 },
            SubmitOutcome::Accepted { job_id: 3 },
        ]);
        let mut uploader = Uploader::new(queue.clone(), &api, Duration::from_secs(1));

        assert!(matches!(
            uploader.run_once().await.unwrap(),
            DrainStep::Retry { .. }
        ));
        assert!(matches!(
            uploader.run_once().await.unwrap(),
            DrainStep::Retry { .. }
        ));
        for _ in 0..3 {
            assert!(matches!(
                uploader.run_once().await.unwrap(),
                DrainStep::Delivered { .. }
            ));
        }
        assert_eq!(uploader.run_once().await.unwrap(), DrainStep::Idle);

        // The first item was offered during the outage too; delivery
        // order after reconnect is still the enqueue order.
        assert_eq!(
            api.submitted(),
            vec!["one.pdf", "one.pdf", "one.pdf", "two.pdf", "three.pdf"]
        );
        assert_eq!(queue.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unauthorized_halts_and_keeps_the_item() {
        let queue = queue_with(&["held.pdf"]).await;
        let api = FakeApi::new(vec![SubmitOutcome::Unauthorized]);
        let mut uploader = Uploader::new(queue.clone(), &api, Duration::from_secs(1));

        assert_eq!(uploader.run_once().await.unwrap(), DrainStep::Unauthorized);
        assert_eq!(queue.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rejection_is_terminal_for_the_item_only() {
        let queue = queue_with(&["bad.pdf", "good.pdf"]).await;
        let api = FakeApi::new(vec![
            SubmitOutcome::Rejected {
                message: "printer_name must not be empty".to_string(),
            },
            SubmitOutcome::Accepted { job_id: 9 },
        ]);
        let mut uploader = Uploader::new(queue.clone(), &api, Duration::from_secs(1));

        assert!(matches!(
            uploader.run_once().await.unwrap(),
            DrainStep::Terminal { .. }
        ));
        assert!(matches!(
            uploader.run_once().await.unwrap(),
            DrainStep::Delivered { .. }
        ));
        assert_eq!(uploader.run_once().await.unwrap(), DrainStep::Idle);
    }

    #[tokio::test]
    async fn duplicate_counts_as_delivered() {
        let queue = queue_with(&["again.pdf"]).await;
        let api = FakeApi::new(vec![SubmitOutcome::Duplicate { job_id: Some(4) }]);
        let mut uploader = Uploader::new(queue.clone(), &api, Duration::from_secs(1));

        assert!(matches!(
            uploader.run_once().await.unwrap(),
            DrainStep::Delivered { .. }
        ));
        assert_eq!(queue.pending_count().await.unwrap(), 0);
    }

    #[test]
    fn backoff_doubles_to_the_cap_and_resets() {
        let mut backoff = Backoff::new();
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
        assert_eq!(backoff.next_delay(), Duration::from_secs(10));
        assert_eq!(backoff.next_delay(), Duration::from_secs(20));
        for _ in 0..10 {
            backoff.next_delay();
        }
        assert_eq!(
            backoff.next_delay(),
            Duration::from_secs(MAX_RETRY_DELAY_SECONDS)
        );
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
    }
}
