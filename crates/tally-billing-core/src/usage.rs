//! Usage accountant
//!
//! Applies counter deltas to the current usage period and appends audit
//! events. Increments go through a single atomic upsert in the repository,
//! so concurrent updates to the same period row are never lost.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use tally_db::{NewUsageEvent, Stores, SubscriptionRepository, UsageRepository};
use tally_types::{ResourceType, Subscription, SubscriptionId, SubscriptionUsage, UsageEvent};

use crate::{BillingError, UsageJob};

/// Usage counter and audit writer
#[derive(Clone)]
pub struct UsageAccountant {
    subscriptions: Arc<dyn SubscriptionRepository>,
    usage: Arc<dyn UsageRepository>,
}

impl UsageAccountant {
    pub fn new(stores: &Stores) -> Self {
        Self {
            subscriptions: stores.subscriptions.clone(),
            usage: stores.usage.clone(),
        }
    }

    /// Add `delta` to the `resource` counter of the subscription's current
    /// period, creating the period row if needed
    pub async fn track_usage(
        &self,
        id: SubscriptionId,
        resource: ResourceType,
        delta: i64,
    ) -> Result<SubscriptionUsage, BillingError> {
        let subscription = self
            .subscriptions
            .find_by_id(id)
            .await?
            .ok_or(BillingError::SubscriptionNotFound)?;

        let usage = self
            .usage
            .increment(id, subscription.current_period(), resource, delta, Utc::now())
            .await?;

        tracing::debug!(
            subscription_id = %id,
            resource = %resource,
            delta,
            count = usage.count_for(resource),
            "Tracked usage"
        );

        Ok(usage)
    }

    /// Append an audit event; the timestamp is assigned by the store
    pub async fn record_usage_event(&self, event: NewUsageEvent) -> Result<UsageEvent, BillingError> {
        Ok(self.usage.record_event(event).await?)
    }

    /// Latest audit events, newest first
    pub async fn recent_events(
        &self,
        id: SubscriptionId,
        limit: i64,
    ) -> Result<Vec<UsageEvent>, BillingError> {
        Ok(self.usage.list_events(id, limit).await?)
    }

    /// Create the zeroed row for the subscription's current period.
    /// Returns `false` if it already existed.
    pub async fn initialize_usage_period(
        &self,
        subscription: &Subscription,
    ) -> Result<bool, BillingError> {
        Ok(self
            .usage
            .initialize_period(subscription.id, subscription.current_period())
            .await?)
    }

    /// Period rollover: initialize the current period of every subscription
    /// active at `now`. Returns how many rows were created.
    ///
    /// A failure on one subscription is logged and the sweep continues.
    pub async fn reset_monthly_usage(&self, now: DateTime<Utc>) -> Result<usize, BillingError> {
        let subscriptions = self.subscriptions.find_active(now).await?;

        let mut created = 0;
        for subscription in &subscriptions {
            match self.initialize_usage_period(subscription).await {
                Ok(true) => created += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(
                    subscription_id = %subscription.id,
                    error = %e,
                    "Failed to initialize usage period"
                ),
            }
        }

        if created > 0 {
            tracing::info!(created, active = subscriptions.len(), "Initialized usage periods");
        }
        Ok(created)
    }

    /// Apply a queued job: counter first, then the audit event
    pub async fn apply(&self, job: &UsageJob) -> Result<(), BillingError> {
        self.track_usage(job.subscription_id, job.resource_type, job.delta)
            .await?;
        self.record_usage_event(NewUsageEvent {
            subscription_id: job.subscription_id,
            event_type: job.event_type,
            resource_type: job.resource_type,
            resource_id: job.resource_id,
        })
        .await?;
        Ok(())
    }
}

impl std::fmt::Debug for UsageAccountant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageAccountant").finish_non_exhaustive()
    }
}
