//! Billing errors

use thiserror::Error;

use tally_db::DbError;
use tally_types::{Limit, ResourceType};

/// Billing errors
#[derive(Error, Debug)]
pub enum BillingError {
    /// Subscription not found by ID
    #[error("subscription not found")]
    SubscriptionNotFound,

    /// Tenant has no subscription at all
    #[error("no active subscription found")]
    NoSubscription,

    /// Tenant's subscription is canceled, pending or past its period
    #[error("subscription not active")]
    SubscriptionNotActive,

    /// Plan limit reached for a resource
    #[error("{reason}")]
    QuotaExceeded {
        resource: ResourceType,
        reason: String,
        current: i64,
        limit: Limit,
    },

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl BillingError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::SubscriptionNotFound => 404,
            Self::NoSubscription | Self::SubscriptionNotActive => 402,
            Self::QuotaExceeded { .. } => 403,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SubscriptionNotFound => "SUBSCRIPTION_NOT_FOUND",
            Self::NoSubscription => "NO_SUBSCRIPTION_FOUND",
            Self::SubscriptionNotActive => "SUBSCRIPTION_NOT_ACTIVE",
            Self::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            Self::Database(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SubscriptionNotFound | Self::NoSubscription)
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Internal(_))
    }
}

impl From<DbError> for BillingError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => Self::SubscriptionNotFound,
            other => {
                tracing::error!(error = %other, "Billing repository failure");
                Self::Database(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_errors_are_payment_required() {
        assert_eq!(BillingError::NoSubscription.status_code(), 402);
        assert_eq!(BillingError::NoSubscription.error_code(), "NO_SUBSCRIPTION_FOUND");
        assert_eq!(BillingError::SubscriptionNotActive.status_code(), 402);
    }

    #[test]
    fn test_quota_message_is_reason() {
        let err = BillingError::QuotaExceeded {
            resource: ResourceType::Organization,
            reason: "Organization limit reached (2/2)".to_string(),
            current: 2,
            limit: Limit::max(2),
        };
        assert_eq!(err.to_string(), "Organization limit reached (2/2)");
        assert_eq!(err.status_code(), 403);
        assert!(!err.is_internal());
    }
}
