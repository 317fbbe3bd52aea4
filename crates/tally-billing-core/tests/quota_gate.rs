//! Quota gate against in-memory stores

use proptest::prelude::*;

use tally_billing_core::{BillingError, QuotaGate};
use tally_db::memory::{plan, MemoryStores};
use tally_types::{
    AccountId, Limit, PlanFlags, PlanLimits, QuotaCheck, ResourceType, SubscriptionStatus,
    SubscriptionUsage,
};

fn two_organizations() -> PlanLimits {
    PlanLimits {
        max_organizations: Limit::max(2),
        max_qr_codes: Limit::max(10),
        max_feedbacks_per_month: Limit::max(100),
        max_team_members: Limit::max(3),
    }
}

/// Seed an active subscription whose current period holds `organizations`
fn seeded(organizations: i64) -> (MemoryStores, QuotaGate, AccountId) {
    let stores = MemoryStores::new();
    let tenant = AccountId::new();
    let subscription = stores.seed_subscription(
        tenant,
        plan("starter", two_organizations(), PlanFlags::default()),
        SubscriptionStatus::Active,
    );

    let mut usage = SubscriptionUsage::empty(subscription.id, subscription.current_period());
    usage.organizations_count = organizations;
    stores.usage.insert(usage);

    let gate = QuotaGate::new(&stores.stores());
    (stores, gate, tenant)
}

#[tokio::test]
async fn test_below_limit_allowed() {
    let (_stores, gate, tenant) = seeded(1);
    let subscription = gate.active_subscription_for(tenant).await.unwrap();

    let check = gate
        .can_add_resource(subscription.id, ResourceType::Organization)
        .await
        .unwrap();
    assert!(check.allowed);
    assert_eq!(check.current, 1);
}

#[tokio::test]
async fn test_at_limit_denied_with_counts() {
    let (_stores, gate, tenant) = seeded(2);
    let subscription = gate.active_subscription_for(tenant).await.unwrap();

    let check = gate
        .can_add_resource(subscription.id, ResourceType::Organization)
        .await
        .unwrap();
    assert!(!check.allowed);
    assert_eq!(check.reason, "Organization limit reached (2/2)");

    match gate.ensure_can_add(tenant, ResourceType::Organization).await {
        Err(BillingError::QuotaExceeded { current, limit, .. }) => {
            assert_eq!(current, 2);
            assert_eq!(limit, Limit::max(2));
        }
        other => panic!("Expected QuotaExceeded, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_usage_row_counts_as_zero() {
    let stores = MemoryStores::new();
    let tenant = AccountId::new();
    let subscription = stores.seed_subscription(
        tenant,
        plan("starter", two_organizations(), PlanFlags::default()),
        SubscriptionStatus::Active,
    );
    let gate = QuotaGate::new(&stores.stores());

    let check = gate
        .can_add_resource(subscription.id, ResourceType::QrCode)
        .await
        .unwrap();
    assert!(check.allowed);
    assert_eq!(check.current, 0);
    // Checking never creates a usage row
    assert_eq!(stores.usage.row_count(subscription.id), 0);
}

#[tokio::test]
async fn test_locations_always_allowed() {
    let (stores, gate, tenant) = seeded(2);
    let subscription = gate.active_subscription_for(tenant).await.unwrap();
    let mut usage = SubscriptionUsage::empty(subscription.id, subscription.current_period());
    usage.locations_count = 10_000;
    stores.usage.insert(usage);

    let check = gate
        .can_add_resource(subscription.id, ResourceType::Location)
        .await
        .unwrap();
    assert!(check.allowed);
}

#[tokio::test]
async fn test_inactive_subscription_denied() {
    let stores = MemoryStores::new();
    let tenant = AccountId::new();
    let subscription = stores.seed_subscription(
        tenant,
        plan("starter", PlanLimits::unlimited(), PlanFlags::default()),
        SubscriptionStatus::Canceled,
    );
    let gate = QuotaGate::new(&stores.stores());

    let check = gate
        .can_add_resource(subscription.id, ResourceType::QrCode)
        .await
        .unwrap();
    assert!(!check.allowed);
    assert_eq!(check.reason, "subscription not active");

    assert!(matches!(
        gate.active_subscription_for(tenant).await,
        Err(BillingError::SubscriptionNotActive)
    ));
}

#[tokio::test]
async fn test_no_subscription() {
    let stores = MemoryStores::new();
    let gate = QuotaGate::new(&stores.stores());

    let err = gate
        .ensure_can_add(AccountId::new(), ResourceType::Organization)
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::NoSubscription));
    assert_eq!(err.status_code(), 402);

    assert!(matches!(
        gate.can_add_resource(tally_types::SubscriptionId::new(), ResourceType::Organization)
            .await,
        Err(BillingError::SubscriptionNotFound)
    ));
}

// ============================================================================
// Boundary Properties
// ============================================================================

fn arb_resource() -> impl Strategy<Value = ResourceType> {
    prop::sample::select(ResourceType::ALL.to_vec())
}

proptest! {
    /// Property: with limit N, N-1 is allowed and N is denied
    #[test]
    fn prop_limit_boundary(resource in arb_resource(), limit in 1i64..10_000) {
        let below = QuotaCheck::evaluate(resource, limit - 1, Limit::max(limit));
        let at = QuotaCheck::evaluate(resource, limit, Limit::max(limit));
        prop_assert!(below.allowed);
        prop_assert!(!at.allowed);
    }

    /// Property: allowed iff current < limit
    #[test]
    fn prop_allowed_iff_below(resource in arb_resource(), limit in 0i64..1_000, current in 0i64..2_000) {
        let check = QuotaCheck::evaluate(resource, current, Limit::max(limit));
        prop_assert_eq!(check.allowed, current < limit);
    }

    /// Property: unlimited always allows
    #[test]
    fn prop_unlimited_always_allows(resource in arb_resource(), current in 0i64..i64::MAX) {
        prop_assert!(QuotaCheck::evaluate(resource, current, Limit::UNLIMITED).allowed);
    }
}
