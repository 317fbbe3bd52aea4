//! Usage accountant and background recorder

use chrono::Utc;

use tally_billing_core::{BillingConfig, BillingError, UsageAccountant, UsageJob, UsageRecorder};
use tally_db::memory::{plan, MemoryStores};
use tally_db::UsageRepository;
use tally_types::{
    AccountId, PlanFlags, PlanLimits, ResourceType, Subscription, SubscriptionId,
    SubscriptionStatus, UsageEventType,
};

fn active(stores: &MemoryStores) -> Subscription {
    stores.seed_subscription(
        AccountId::new(),
        plan("pro", PlanLimits::unlimited(), PlanFlags::default()),
        SubscriptionStatus::Active,
    )
}

#[tokio::test]
async fn test_sequential_tracking_creates_one_row() {
    let stores = MemoryStores::new();
    let subscription = active(&stores);
    let accountant = UsageAccountant::new(&stores.stores());

    accountant
        .track_usage(subscription.id, ResourceType::Feedback, 1)
        .await
        .unwrap();
    let usage = accountant
        .track_usage(subscription.id, ResourceType::Feedback, 1)
        .await
        .unwrap();

    assert_eq!(usage.feedbacks_count, 2);
    assert_eq!(usage.period(), subscription.current_period());
    assert_eq!(stores.usage.row_count(subscription.id), 1);
}

#[tokio::test]
async fn test_decrement_clamps_at_zero() {
    let stores = MemoryStores::new();
    let subscription = active(&stores);
    let accountant = UsageAccountant::new(&stores.stores());

    let usage = accountant
        .track_usage(subscription.id, ResourceType::Organization, -1)
        .await
        .unwrap();
    assert_eq!(usage.organizations_count, 0);
}

#[tokio::test]
async fn test_unknown_subscription() {
    let stores = MemoryStores::new();
    let accountant = UsageAccountant::new(&stores.stores());

    assert!(matches!(
        accountant
            .track_usage(SubscriptionId::new(), ResourceType::QrCode, 1)
            .await,
        Err(BillingError::SubscriptionNotFound)
    ));
}

#[tokio::test]
async fn test_initialize_period_idempotent() {
    let stores = MemoryStores::new();
    let subscription = active(&stores);
    let accountant = UsageAccountant::new(&stores.stores());

    assert!(accountant.initialize_usage_period(&subscription).await.unwrap());
    assert!(!accountant.initialize_usage_period(&subscription).await.unwrap());
    assert_eq!(stores.usage.row_count(subscription.id), 1);
}

#[tokio::test]
async fn test_reset_monthly_usage_skips_inactive() {
    let stores = MemoryStores::new();
    let first = active(&stores);
    let second = active(&stores);
    let canceled = stores.seed_subscription(
        AccountId::new(),
        plan("pro", PlanLimits::unlimited(), PlanFlags::default()),
        SubscriptionStatus::Canceled,
    );
    let accountant = UsageAccountant::new(&stores.stores());

    assert_eq!(accountant.reset_monthly_usage(Utc::now()).await.unwrap(), 2);
    assert_eq!(accountant.reset_monthly_usage(Utc::now()).await.unwrap(), 0);

    assert_eq!(stores.usage.row_count(first.id), 1);
    assert_eq!(stores.usage.row_count(second.id), 1);
    assert_eq!(stores.usage.row_count(canceled.id), 0);
}

#[tokio::test]
async fn test_recorder_applies_jobs_before_shutdown() {
    let stores = MemoryStores::new();
    let subscription = active(&stores);
    let accountant = UsageAccountant::new(&stores.stores());
    let (recorder, handle) = UsageRecorder::spawn(accountant.clone(), &BillingConfig::default());

    for _ in 0..3 {
        assert!(recorder.record(UsageJob::created(subscription.id, ResourceType::QrCode)));
    }
    assert!(recorder.record(UsageJob::deleted(subscription.id, ResourceType::QrCode)));

    drop(recorder);
    handle.shutdown().await;

    let events = accountant.recent_events(subscription.id, 10).await.unwrap();
    assert_eq!(events.len(), 4);
    assert_eq!(
        events
            .iter()
            .filter(|e| e.event_type == UsageEventType::Delete)
            .count(),
        1
    );

    assert_eq!(stores.usage.row_count(subscription.id), 1);
    let counts = stores
        .usage
        .find_by_period(subscription.id, subscription.current_period())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(counts.qr_codes_count, 2);
}

#[tokio::test]
async fn test_failed_job_does_not_stop_workers() {
    let stores = MemoryStores::new();
    let subscription = active(&stores);
    let accountant = UsageAccountant::new(&stores.stores());
    let (recorder, handle) =
        UsageRecorder::spawn(accountant.clone(), &BillingConfig::new().with_workers(1));

    // Unknown subscription fails inside the worker and is only logged
    recorder.record(UsageJob::created(SubscriptionId::new(), ResourceType::QrCode));
    recorder.record(UsageJob::created(subscription.id, ResourceType::QrCode));

    drop(recorder);
    handle.shutdown().await;

    assert_eq!(stores.usage.event_count(), 1);
}
