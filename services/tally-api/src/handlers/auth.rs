//! Authentication handlers (login, refresh, me, deactivation)

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_auth_core::IssuedToken;
use tally_axum::{bearer_token, ApiError, RequireAuth};
use tally_types::{AccountId, FeatureSnapshot, MemberRole};

use super::ApiResult;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: Option<DateTime<Utc>>,
    pub member_id: AccountId,
    pub tenant_id: AccountId,
    pub role: MemberRole,
    pub subscription_features: Option<FeatureSnapshot>,
}

impl From<IssuedToken> for TokenResponse {
    fn from(issued: IssuedToken) -> Self {
        let expires_at = issued.claims.expires_at();
        Self {
            access_token: issued.token,
            token_type: "Bearer",
            expires_at,
            member_id: issued.claims.member_id,
            tenant_id: issued.claims.account_id,
            role: issued.claims.role,
            subscription_features: issued.claims.subscription_features,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub member_id: AccountId,
    pub tenant_id: AccountId,
    pub role: MemberRole,
    pub name: String,
    pub email: String,
    pub is_team_member: bool,
    pub subscription_features: Option<FeatureSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct DeactivationResponse {
    pub deactivation_date: DateTime<Utc>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let outcome = state.accounts.login(&req.email, &req.password).await?;
    Ok(Json(outcome.token.into()))
}

/// POST /api/v1/auth/refresh
///
/// Re-issues the presented token from current membership and subscription
/// state.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<TokenResponse>> {
    let token = bearer_token(&headers).ok_or_else(ApiError::unauthorized)?;
    let issued = state.issuer.refresh_token(token).await?;
    Ok(Json(issued.into()))
}

/// GET /api/v1/auth/me
pub async fn me(RequireAuth(context): RequireAuth) -> Json<MeResponse> {
    Json(MeResponse {
        member_id: context.personal_id,
        tenant_id: context.tenant_id,
        role: context.role,
        is_team_member: context.is_team_member(),
        name: context.name,
        email: context.email,
        subscription_features: context.features,
    })
}

/// POST /api/v1/auth/deactivation
pub async fn request_deactivation(
    State(state): State<AppState>,
    RequireAuth(context): RequireAuth,
) -> ApiResult<Json<DeactivationResponse>> {
    let deactivation_date = state
        .accounts
        .request_deactivation(context.personal_id)
        .await?;
    Ok(Json(DeactivationResponse { deactivation_date }))
}

/// DELETE /api/v1/auth/deactivation
pub async fn cancel_deactivation(
    State(state): State<AppState>,
    RequireAuth(context): RequireAuth,
) -> ApiResult<StatusCode> {
    state
        .accounts
        .cancel_deactivation(context.personal_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
