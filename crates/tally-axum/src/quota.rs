//! Quota and usage middleware.
//!
//! [`check_resource_limit`] and [`release_resource`] wrap resource routes
//! and leave a [`PendingUsage`] on the handler's response;
//! [`track_usage_after_success`] sits outside them and queues that update
//! only if the response is not an error.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use tally_billing_core::{UsageJob, UsageRecorder};
use tally_types::{PlanFeature, QuotaCheck, ResourceType, SubscriptionId};

use crate::auth::GuardState;
use crate::context::AuthContext;
use crate::error::ApiError;
use crate::extractors::feature_not_available;

/// State for the per-resource middleware.
#[derive(Clone, Debug)]
pub struct ResourceGate {
    pub guard: GuardState,
    pub resource: ResourceType,
}

impl ResourceGate {
    #[must_use]
    pub fn new(guard: GuardState, resource: ResourceType) -> Self {
        Self { guard, resource }
    }
}

/// Outcome of the quota check, available to the handler as an extension.
#[derive(Debug, Clone)]
pub struct QuotaContext {
    pub subscription_id: SubscriptionId,
    pub resource: ResourceType,
    pub check: QuotaCheck,
}

/// Usage update waiting for the response status.
#[derive(Debug, Clone)]
pub struct PendingUsage(pub UsageJob);

/// Set by handlers on their response to tag the usage event with the
/// created or deleted resource.
#[derive(Debug, Clone, Copy)]
pub struct AffectedResource(pub Uuid);

fn auth_context(req: &Request) -> Result<AuthContext, ApiError> {
    req.extensions()
        .get::<AuthContext>()
        .cloned()
        .ok_or_else(ApiError::unauthorized)
}

/// Deny creation when the tenant has no active subscription or has used up
/// the plan's limit for the resource.
pub async fn check_resource_limit(
    State(gate): State<ResourceGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let context = auth_context(&req)?;
    let (subscription, check) = gate
        .guard
        .quota
        .ensure_can_add(context.tenant_id, gate.resource)
        .await?;

    tracing::debug!(
        tenant_id = %context.tenant_id,
        resource = %gate.resource,
        reason = %check.reason,
        "Quota check passed"
    );

    req.extensions_mut().insert(QuotaContext {
        subscription_id: subscription.id,
        resource: gate.resource,
        check,
    });

    let mut response = next.run(req).await;
    response
        .extensions_mut()
        .insert(PendingUsage(UsageJob::created(subscription.id, gate.resource)));
    Ok(response)
}

/// Mark a deletion route so a successful response decrements usage.
///
/// Never blocks the deletion: without a subscription there is simply
/// nothing to decrement.
pub async fn release_resource(
    State(gate): State<ResourceGate>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let context = auth_context(&req)?;
    let subscription = match gate.guard.quota.subscription_for(context.tenant_id).await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::warn!(
                tenant_id = %context.tenant_id,
                error = %e,
                "Subscription lookup failed, usage will not be released"
            );
            None
        }
    };

    let mut response = next.run(req).await;
    if let Some(subscription) = subscription {
        response
            .extensions_mut()
            .insert(PendingUsage(UsageJob::deleted(subscription.id, gate.resource)));
    }
    Ok(response)
}

/// Queue the pending usage update once the handler has succeeded.
///
/// Enqueue-and-return: the response is never delayed or failed by usage
/// accounting.
pub async fn track_usage_after_success(
    State(recorder): State<UsageRecorder>,
    req: Request,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;

    let Some(PendingUsage(mut job)) = response.extensions_mut().remove::<PendingUsage>() else {
        return response;
    };

    if response.status().as_u16() >= 400 {
        tracing::debug!(
            status = %response.status(),
            resource = %job.resource_type,
            "Handler failed, usage not tracked"
        );
        return response;
    }

    if let Some(AffectedResource(id)) = response.extensions().get::<AffectedResource>() {
        job = job.with_resource_id(*id);
    }
    recorder.record(job);
    response
}

/// Reject with 403 unless the token's plan snapshot carries `feature`.
pub async fn require_feature(
    State(feature): State<PlanFeature>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let context = auth_context(&req)?;
    if !context.has_feature(feature) {
        return Err(feature_not_available(feature));
    }
    Ok(next.run(req).await)
}
