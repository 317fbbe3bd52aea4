//! Axum extractors for authentication and feature checks.
//!
//! These read the [`AuthContext`] that [`authenticate`](crate::authenticate)
//! attached to the request.
//!
//! # Usage
//!
//! ```ignore
//! use tally_axum::{RequireAuth, RequireFeature};
//! use tally_types::PlanFeature;
//!
//! async fn dashboard(auth: RequireAuth) -> Result<String, ApiError> {
//!     let auth = RequireFeature::new(auth.0, PlanFeature::AdvancedAnalytics)?;
//!     Ok(format!("Analytics for {}", auth.tenant_id))
//! }
//! ```

use std::ops::Deref;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use serde_json::json;

use tally_types::PlanFeature;

use crate::context::AuthContext;
use crate::error::ApiError;

/// Extractor that requires authentication.
///
/// Returns 401 Unauthorized if no valid authentication is present.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthContext);

impl Deref for RequireAuth {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(Self)
            .ok_or_else(ApiError::unauthorized)
    }
}

/// Proof that the tenant's plan snapshot carries a feature.
///
/// Answered from the token alone, without a database round trip.
#[derive(Debug, Clone)]
pub struct RequireFeature {
    pub context: AuthContext,
    pub feature: PlanFeature,
}

impl Deref for RequireFeature {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

impl RequireFeature {
    pub fn new(context: AuthContext, feature: PlanFeature) -> Result<Self, ApiError> {
        if context.has_feature(feature) {
            Ok(Self { context, feature })
        } else {
            Err(feature_not_available(feature))
        }
    }
}

pub(crate) fn feature_not_available(feature: PlanFeature) -> ApiError {
    ApiError::new(
        StatusCode::FORBIDDEN,
        "FEATURE_NOT_AVAILABLE",
        format!("{feature} is not available on your plan"),
    )
    .with_details(json!({ "feature": feature }))
}
