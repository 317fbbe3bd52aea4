//! Usage summary handler

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use tally_axum::RequireAuth;
use tally_types::{
    PlanFlags, PlanLimits, ResourceType, SubscriptionId, SubscriptionStatus, UsageEvent,
};

use super::ApiResult;
use crate::state::AppState;

const RECENT_EVENTS: i64 = 20;

#[derive(Debug, Serialize)]
pub struct ResourceUsage {
    pub resource_type: ResourceType,
    pub current: i64,
    /// `None` when unlimited
    pub limit: Option<i64>,
    pub remaining: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub subscription_id: SubscriptionId,
    pub plan: String,
    pub status: SubscriptionStatus,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub limits: PlanLimits,
    pub features: PlanFlags,
    pub usage: Vec<ResourceUsage>,
    pub recent_events: Vec<UsageEvent>,
}

/// GET /api/v1/usage
///
/// Current-period counters of the caller's tenant against its plan.
pub async fn get_usage(
    State(state): State<AppState>,
    RequireAuth(context): RequireAuth,
) -> ApiResult<Json<UsageResponse>> {
    let subscription = state.quota.active_subscription_for(context.tenant_id).await?;
    let counters = state.quota.current_usage(&subscription).await?;
    let recent_events = state
        .usage
        .recent_events(subscription.id, RECENT_EVENTS)
        .await?;

    let limits = subscription.plan.limits;
    let usage = ResourceType::ALL
        .into_iter()
        .map(|resource| {
            let current = counters.count_for(resource);
            let limit = limits.limit_for(resource);
            ResourceUsage {
                resource_type: resource,
                current,
                limit: (!limit.is_unlimited()).then_some(limit.0),
                remaining: limit.remaining(current),
            }
        })
        .collect();

    Ok(Json(UsageResponse {
        subscription_id: subscription.id,
        plan: subscription.plan.display_name.clone(),
        status: subscription.status,
        period_start: counters.period_start,
        period_end: counters.period_end,
        limits,
        features: subscription.plan.flags,
        usage,
        recent_events,
    }))
}
