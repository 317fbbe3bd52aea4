//! Usage periods, counters, audit events and quota decisions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Limit, ResourceType, SubscriptionId, UsageEventType, UsageId};

/// Billing-cycle window usage is measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsagePeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl UsagePeriod {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Per-subscription, per-period resource counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionUsage {
    pub id: UsageId,
    pub subscription_id: SubscriptionId,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub organizations_count: i64,
    pub locations_count: i64,
    pub qr_codes_count: i64,
    pub feedbacks_count: i64,
    pub team_members_count: i64,
    pub last_updated_at: DateTime<Utc>,
}

impl SubscriptionUsage {
    /// A zeroed row for a period that has no tracked events yet
    pub fn empty(subscription_id: SubscriptionId, period: UsagePeriod) -> Self {
        Self {
            id: UsageId::new(),
            subscription_id,
            period_start: period.start,
            period_end: period.end,
            organizations_count: 0,
            locations_count: 0,
            qr_codes_count: 0,
            feedbacks_count: 0,
            team_members_count: 0,
            last_updated_at: Utc::now(),
        }
    }

    pub fn period(&self) -> UsagePeriod {
        UsagePeriod {
            start: self.period_start,
            end: self.period_end,
        }
    }

    /// Counter matching a resource type
    pub const fn count_for(&self, resource: ResourceType) -> i64 {
        match resource {
            ResourceType::Organization => self.organizations_count,
            ResourceType::Location => self.locations_count,
            ResourceType::QrCode => self.qr_codes_count,
            ResourceType::Feedback => self.feedbacks_count,
            ResourceType::TeamMember => self.team_members_count,
        }
    }

    /// Add `delta` to the counter for `resource`, never going below zero
    pub fn apply_delta(&mut self, resource: ResourceType, delta: i64, at: DateTime<Utc>) {
        let counter = match resource {
            ResourceType::Organization => &mut self.organizations_count,
            ResourceType::Location => &mut self.locations_count,
            ResourceType::QrCode => &mut self.qr_codes_count,
            ResourceType::Feedback => &mut self.feedbacks_count,
            ResourceType::TeamMember => &mut self.team_members_count,
        };
        *counter = counter.saturating_add(delta).max(0);
        self.last_updated_at = at;
    }
}

/// Append-only audit record of one usage-affecting action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub id: Uuid,
    pub subscription_id: SubscriptionId,
    pub event_type: UsageEventType,
    pub resource_type: ResourceType,
    pub resource_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a quota check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaCheck {
    /// Whether one more unit may be created
    pub allowed: bool,
    /// Human-readable reason, used directly in error responses
    pub reason: String,
    /// Counter value the decision was based on
    pub current: i64,
    /// Limit the counter was compared against
    pub limit: Limit,
}

impl QuotaCheck {
    /// Compare a counter against a limit
    pub fn evaluate(resource: ResourceType, current: i64, limit: Limit) -> Self {
        if limit.is_unlimited() {
            return Self {
                allowed: true,
                reason: format!("{} limit is unlimited", resource.label()),
                current,
                limit,
            };
        }

        let allowed = limit.allows(current);
        let reason = if allowed {
            format!("{} within limit ({}/{})", resource.label(), current, limit.0)
        } else {
            format!("{} limit reached ({}/{})", resource.label(), current, limit.0)
        };

        Self {
            allowed,
            reason,
            current,
            limit,
        }
    }

    /// Denial for a subscription that is not active
    pub fn inactive() -> Self {
        Self {
            allowed: false,
            reason: "subscription not active".to_string(),
            current: 0,
            limit: Limit::max(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn period() -> UsagePeriod {
        let start = Utc::now() - Duration::days(1);
        UsagePeriod {
            start,
            end: start + Duration::days(30),
        }
    }

    #[test]
    fn test_apply_delta_targets_matching_counter() {
        let mut usage = SubscriptionUsage::empty(SubscriptionId::new(), period());
        usage.apply_delta(ResourceType::QrCode, 3, Utc::now());
        usage.apply_delta(ResourceType::Feedback, 1, Utc::now());
        assert_eq!(usage.count_for(ResourceType::QrCode), 3);
        assert_eq!(usage.count_for(ResourceType::Feedback), 1);
        assert_eq!(usage.count_for(ResourceType::Organization), 0);
    }

    #[test]
    fn test_apply_delta_clamps_at_zero() {
        let mut usage = SubscriptionUsage::empty(SubscriptionId::new(), period());
        usage.apply_delta(ResourceType::Organization, 1, Utc::now());
        usage.apply_delta(ResourceType::Organization, -5, Utc::now());
        assert_eq!(usage.organizations_count, 0);
    }

    #[test]
    fn test_quota_reason_format() {
        let check = QuotaCheck::evaluate(ResourceType::Organization, 2, Limit::max(2));
        assert!(!check.allowed);
        assert_eq!(check.reason, "Organization limit reached (2/2)");

        let check = QuotaCheck::evaluate(ResourceType::Organization, 1, Limit::max(2));
        assert!(check.allowed);
        assert_eq!(check.reason, "Organization within limit (1/2)");
    }

    #[test]
    fn test_period_contains_is_half_open() {
        let p = period();
        assert!(p.contains(p.start));
        assert!(!p.contains(p.end));
    }
}
