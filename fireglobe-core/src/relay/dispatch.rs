//! Out-of-band delivery of analysis requests.
//!
//! A bounded queue drained by one background task. Each job is retried with
//! exponential backoff and its final outcome is reported on a per-job
//! channel, so callers can fire and forget or await the result.

use super::{AnalysisRequest, AnalysisSink};
use crate::config::RelayConfig;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.backoff_multiplier,
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.saturating_sub(1) as i32);
        self.initial_backoff.mul_f64(factor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Delivered { attempts: u32 },
    Failed { attempts: u32, error: String },
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            DispatchOutcome::Delivered { attempts } | DispatchOutcome::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Completion channel for one dispatched job
#[derive(Debug)]
pub struct DispatchHandle {
    rx: oneshot::Receiver<DispatchOutcome>,
}

impl DispatchHandle {
    /// A handle that has already finished
    pub fn ready(outcome: DispatchOutcome) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Self { rx }
    }

    /// Wait for the job to finish
    pub async fn outcome(self) -> DispatchOutcome {
        self.rx.await.unwrap_or_else(|_| DispatchOutcome::Failed {
            attempts: 0,
            error: "dispatcher stopped before the job finished".into(),
        })
    }
}

struct Job {
    request: AnalysisRequest,
    reply: oneshot::Sender<DispatchOutcome>,
}

/// Handle to the background delivery worker. Cloning shares the queue.
#[derive(Clone)]
pub struct RelayDispatcher {
    tx: mpsc::Sender<Job>,
}

impl RelayDispatcher {
    /// Start the worker. Must be called inside a tokio runtime.
    pub fn spawn(sink: Arc<dyn AnalysisSink>, policy: RetryPolicy, queue_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        tokio::spawn(run_worker(rx, sink, policy));
        Self { tx }
    }

    /// Queue a request. A full or closed queue fails the job immediately.
    pub fn dispatch(&self, request: AnalysisRequest) -> DispatchHandle {
        let (reply, rx) = oneshot::channel();
        let tx_hash = request.transaction_hash.clone();

        match self.tx.try_send(Job { request, reply }) {
            Ok(()) => {
                tracing::debug!("Queued relay delivery for {}", tx_hash);
                DispatchHandle { rx }
            }
            Err(e) => {
                let reason = match e {
                    mpsc::error::TrySendError::Full(_) => "relay queue is full",
                    mpsc::error::TrySendError::Closed(_) => "relay dispatcher has stopped",
                };
                tracing::warn!("Dropped relay delivery for {}: {}", tx_hash, reason);
                DispatchHandle::ready(DispatchOutcome::Failed {
                    attempts: 0,
                    error: reason.to_string(),
                })
            }
        }
    }
}

async fn run_worker(mut rx: mpsc::Receiver<Job>, sink: Arc<dyn AnalysisSink>, policy: RetryPolicy) {
    while let Some(job) = rx.recv().await {
        let outcome = deliver_with_retry(sink.as_ref(), &job.request, &policy).await;
        match &outcome {
            DispatchOutcome::Delivered { attempts } => tracing::info!(
                "Relayed transaction {} after {} attempt(s)",
                job.request.transaction_hash,
                attempts
            ),
            DispatchOutcome::Failed { attempts, error } => tracing::error!(
                "Giving up on relaying {} after {} attempt(s): {}",
                job.request.transaction_hash,
                attempts,
                error
            ),
        }
        // receiver may have been dropped by a fire-and-forget caller
        let _ = job.reply.send(outcome);
    }
}

async fn deliver_with_retry(sink: &dyn AnalysisSink, request: &AnalysisRequest, policy: &RetryPolicy) -> DispatchOutcome {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match sink.deliver(request).await {
            Ok(()) => return DispatchOutcome::Delivered { attempts: attempt },
            Err(e) if attempt < policy.max_attempts && e.is_retryable() => {
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    "Relay attempt {} for {} failed, retrying in {:?}: {}",
                    attempt,
                    request.transaction_hash,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return DispatchOutcome::Failed {
                    attempts: attempt,
                    error: e.persist().to_string(),
                }
            }
        }
    }
}
