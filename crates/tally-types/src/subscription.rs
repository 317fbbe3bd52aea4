//! Subscription types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, ParseError, SubscriptionId, SubscriptionPlan, UsagePeriod};

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Subscription is active
    Active,
    /// Awaiting payment confirmation
    Pending,
    /// Subscription was canceled
    Canceled,
    /// Billing period ran out without renewal
    Expired,
}

impl SubscriptionStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "pending" => Ok(Self::Pending),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            "expired" => Ok(Self::Expired),
            _ => Err(ParseError::SubscriptionStatus(s.to_string())),
        }
    }
}

/// An account's subscription, with its plan resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscription ID
    pub id: SubscriptionId,
    /// Account (tenant) that owns the subscription
    pub account_id: AccountId,
    /// Plan the subscription is on
    pub plan: SubscriptionPlan,
    /// Subscription status
    pub status: SubscriptionStatus,
    /// Current billing period start
    pub current_period_start: DateTime<Utc>,
    /// Current billing period end
    pub current_period_end: DateTime<Utc>,
    /// Scheduled cancellation, if any
    pub cancel_at: Option<DateTime<Utc>>,
    /// Payment provider customer reference
    pub stripe_customer_id: Option<String>,
    /// Payment provider subscription reference
    pub stripe_subscription_id: Option<String>,
    /// When the subscription was created
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// Active iff status is `Active` and `now` is before the period end
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && now < self.current_period_end
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    /// The billing period usage is currently measured against
    pub fn current_period(&self) -> UsagePeriod {
        UsagePeriod {
            start: self.current_period_start,
            end: self.current_period_end,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{PlanFlags, PlanId, PlanLimits};

    fn subscription(status: SubscriptionStatus, end: DateTime<Utc>) -> Subscription {
        Subscription {
            id: SubscriptionId::new(),
            account_id: AccountId::new(),
            plan: SubscriptionPlan {
                id: PlanId::new(),
                name: "starter".to_string(),
                display_name: "Starter".to_string(),
                price_cents: 0,
                limits: PlanLimits::unlimited(),
                flags: PlanFlags::default(),
            },
            status,
            current_period_start: end - Duration::days(30),
            current_period_end: end,
            cancel_at: None,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            created_at: end - Duration::days(30),
        }
    }

    #[test]
    fn test_active_before_period_end() {
        let now = Utc::now();
        let sub = subscription(SubscriptionStatus::Active, now + Duration::days(1));
        assert!(sub.is_active_at(now));
    }

    #[test]
    fn test_inactive_at_period_end() {
        let now = Utc::now();
        let sub = subscription(SubscriptionStatus::Active, now);
        assert!(!sub.is_active_at(now));
    }

    #[test]
    fn test_inactive_when_status_not_active() {
        let now = Utc::now();
        for status in [
            SubscriptionStatus::Pending,
            SubscriptionStatus::Canceled,
            SubscriptionStatus::Expired,
        ] {
            let sub = subscription(status, now + Duration::days(10));
            assert!(!sub.is_active_at(now), "{status} should not be active");
        }
    }

    #[test]
    fn test_status_parse_accepts_british_spelling() {
        assert_eq!(
            "cancelled".parse::<SubscriptionStatus>().unwrap(),
            SubscriptionStatus::Canceled
        );
    }
}
