//! Quota gate
//!
//! Point-in-time, advisory check made just before a resource is created.
//! It does not reserve capacity: two concurrent requests can both pass with
//! one unit left, and both creations are then counted.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;

use tally_db::{Stores, SubscriptionRepository, UsageRepository};
use tally_types::{
    AccountId, QuotaCheck, ResourceType, Subscription, SubscriptionId, SubscriptionUsage,
};

use crate::BillingError;

/// Plan limit checks against current-period usage
#[derive(Clone)]
pub struct QuotaGate {
    subscriptions: Arc<dyn SubscriptionRepository>,
    usage: Arc<dyn UsageRepository>,
}

impl QuotaGate {
    pub fn new(stores: &Stores) -> Self {
        Self {
            subscriptions: stores.subscriptions.clone(),
            usage: stores.usage.clone(),
        }
    }

    /// Whether subscription `id` permits one more `resource` this period
    pub async fn can_add_resource(
        &self,
        id: SubscriptionId,
        resource: ResourceType,
    ) -> Result<QuotaCheck, BillingError> {
        let subscription = self
            .subscriptions
            .find_by_id(id)
            .await?
            .ok_or(BillingError::SubscriptionNotFound)?;

        self.check_subscription(&subscription, resource).await
    }

    /// Same check for an already loaded subscription
    pub async fn check_subscription(
        &self,
        subscription: &Subscription,
        resource: ResourceType,
    ) -> Result<QuotaCheck, BillingError> {
        if !subscription.is_active_at(Utc::now()) {
            return Ok(QuotaCheck::inactive());
        }

        let current = self.current_usage(subscription).await?.count_for(resource);
        let check = QuotaCheck::evaluate(resource, current, subscription.plan.limits.limit_for(resource));

        if !check.allowed {
            counter!("tally_quota_denied_total", "resource" => resource.as_str()).increment(1);
            tracing::info!(
                subscription_id = %subscription.id,
                resource = %resource,
                current = check.current,
                limit = %check.limit,
                "Quota denied"
            );
        }

        Ok(check)
    }

    /// The tenant's subscription, required to be active
    pub async fn active_subscription_for(
        &self,
        tenant: AccountId,
    ) -> Result<Subscription, BillingError> {
        let subscription = self
            .subscription_for(tenant)
            .await?
            .ok_or(BillingError::NoSubscription)?;

        if !subscription.is_active_at(Utc::now()) {
            return Err(BillingError::SubscriptionNotActive);
        }

        Ok(subscription)
    }

    /// The tenant's latest subscription, whatever its status
    pub async fn subscription_for(
        &self,
        tenant: AccountId,
    ) -> Result<Option<Subscription>, BillingError> {
        Ok(self.subscriptions.find_by_account_id(tenant).await?)
    }

    /// Counters for the subscription's current period; zeros if no row yet
    pub async fn current_usage(
        &self,
        subscription: &Subscription,
    ) -> Result<SubscriptionUsage, BillingError> {
        let period = subscription.current_period();
        Ok(self
            .usage
            .find_by_period(subscription.id, period)
            .await?
            .unwrap_or_else(|| SubscriptionUsage::empty(subscription.id, period)))
    }

    /// Resolve the tenant's subscription and require room for one more
    /// `resource`, turning a denial into [`BillingError::QuotaExceeded`]
    pub async fn ensure_can_add(
        &self,
        tenant: AccountId,
        resource: ResourceType,
    ) -> Result<(Subscription, QuotaCheck), BillingError> {
        let subscription = self.active_subscription_for(tenant).await?;
        let check = self.check_subscription(&subscription, resource).await?;

        if !check.allowed {
            return Err(BillingError::QuotaExceeded {
                resource,
                reason: check.reason,
                current: check.current,
                limit: check.limit,
            });
        }

        Ok((subscription, check))
    }
}

impl std::fmt::Debug for QuotaGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaGate").finish_non_exhaustive()
    }
}
