//! Background usage recording.
//!
//! Jobs are queued on a bounded channel and applied by a small worker pool,
//! off the request path. When the queue is full the job is dropped and
//! counted; nothing is retried.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use tally_types::{ResourceType, SubscriptionId, UsageEventType};

use crate::{BillingConfig, UsageAccountant};

/// One usage update to apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageJob {
    pub subscription_id: SubscriptionId,
    pub resource_type: ResourceType,
    pub delta: i64,
    pub event_type: UsageEventType,
    pub resource_id: Option<Uuid>,
}

impl UsageJob {
    /// A resource was created
    #[must_use]
    pub fn created(subscription_id: SubscriptionId, resource_type: ResourceType) -> Self {
        Self {
            subscription_id,
            resource_type,
            delta: 1,
            event_type: UsageEventType::Create,
            resource_id: None,
        }
    }

    /// A resource was deleted
    #[must_use]
    pub fn deleted(subscription_id: SubscriptionId, resource_type: ResourceType) -> Self {
        Self {
            subscription_id,
            resource_type,
            delta: -1,
            event_type: UsageEventType::Delete,
            resource_id: None,
        }
    }

    #[must_use]
    pub fn with_resource_id(mut self, id: Uuid) -> Self {
        self.resource_id = Some(id);
        self
    }
}

/// Fire-and-forget handle onto the usage queue
#[derive(Clone, Debug)]
pub struct UsageRecorder {
    tx: mpsc::Sender<UsageJob>,
}

impl UsageRecorder {
    /// Start the worker pool.
    ///
    /// Returns the recorder and a handle to the workers.
    pub fn spawn(accountant: UsageAccountant, config: &BillingConfig) -> (Self, UsageRecorderHandle) {
        let (tx, rx) = mpsc::channel(config.usage_queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..config.usage_workers.max(1))
            .map(|worker| tokio::spawn(Self::run_worker(worker, accountant.clone(), rx.clone())))
            .collect();

        (Self { tx }, UsageRecorderHandle { workers })
    }

    /// Queue a job without waiting. Returns `false` if it was dropped.
    pub fn record(&self, job: UsageJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => {
                counter!("tally_usage_enqueued_total").increment(1);
                true
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                counter!("tally_usage_dropped_total").increment(1);
                tracing::warn!(
                    subscription_id = %job.subscription_id,
                    resource = %job.resource_type,
                    delta = job.delta,
                    "Usage queue full, dropping update"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                counter!("tally_usage_dropped_total").increment(1);
                tracing::warn!(
                    subscription_id = %job.subscription_id,
                    resource = %job.resource_type,
                    "Usage queue closed, dropping update"
                );
                false
            }
        }
    }

    async fn run_worker(
        worker: usize,
        accountant: UsageAccountant,
        rx: Arc<Mutex<mpsc::Receiver<UsageJob>>>,
    ) {
        loop {
            let job = rx.lock().await.recv().await;
            let Some(job) = job else {
                break;
            };

            if let Err(e) = accountant.apply(&job).await {
                counter!("tally_usage_failed_total").increment(1);
                tracing::warn!(
                    worker,
                    error = %e,
                    subscription_id = %job.subscription_id,
                    resource = %job.resource_type,
                    delta = job.delta,
                    "Failed to record usage"
                );
            }
        }
        tracing::debug!(worker, "Usage worker stopped");
    }
}

/// Handle for the background usage workers.
pub struct UsageRecorderHandle {
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl UsageRecorderHandle {
    /// Wait for the workers to drain the queue.
    ///
    /// Completes once every [`UsageRecorder`] clone has been dropped.
    pub async fn shutdown(self) {
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_constructors() {
        let sub = SubscriptionId::new();
        let created = UsageJob::created(sub, ResourceType::QrCode);
        assert_eq!(created.delta, 1);
        assert_eq!(created.event_type, UsageEventType::Create);

        let id = Uuid::new_v4();
        let deleted = UsageJob::deleted(sub, ResourceType::Organization).with_resource_id(id);
        assert_eq!(deleted.delta, -1);
        assert_eq!(deleted.event_type, UsageEventType::Delete);
        assert_eq!(deleted.resource_id, Some(id));
    }
}
