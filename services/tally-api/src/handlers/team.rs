//! Team management handlers (members and invitations)

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tally_auth_core::TeamMemberDetails;
use tally_axum::{AffectedResource, RequireAuth};
use tally_db::{TeamInvitationRow, TeamMemberRow};
use tally_types::{InvitationId, MemberRole, TeamMemberId};

use super::ApiResult;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub email: String,
    pub role: MemberRole,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: MemberRole,
}

#[derive(Debug, Deserialize)]
pub struct AcceptRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub id: Uuid,
    pub member_id: Uuid,
    pub role: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub invited_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl From<TeamMemberRow> for MemberResponse {
    fn from(row: TeamMemberRow) -> Self {
        Self {
            id: row.id,
            member_id: row.member_id,
            role: row.role,
            email: None,
            name: None,
            invited_at: row.invited_at,
            accepted_at: row.accepted_at,
        }
    }
}

impl From<TeamMemberDetails> for MemberResponse {
    fn from(details: TeamMemberDetails) -> Self {
        Self {
            email: Some(details.email),
            name: Some(details.name),
            ..details.membership.into()
        }
    }
}

/// Invitation as shown to the team. The token is never echoed back; it only
/// reaches the invitee through the invitation sender.
#[derive(Debug, Serialize)]
pub struct InvitationResponse {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub invited_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<TeamInvitationRow> for InvitationResponse {
    fn from(row: TeamInvitationRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            role: row.role,
            invited_by: row.invited_by,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

// ============================================================================
// Members
// ============================================================================

/// GET /api/v1/team/members
pub async fn list_members(
    State(state): State<AppState>,
    RequireAuth(context): RequireAuth,
) -> ApiResult<Json<Vec<MemberResponse>>> {
    let members = state.team.list_members(context.tenant_id).await?;
    Ok(Json(members.into_iter().map(Into::into).collect()))
}

/// PUT /api/v1/team/members/{id}/role
pub async fn update_member_role(
    State(state): State<AppState>,
    RequireAuth(context): RequireAuth,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> ApiResult<Json<MemberResponse>> {
    let membership = state
        .team
        .update_role(context.tenant_id, TeamMemberId(id), req.role)
        .await?;
    Ok(Json(membership.into()))
}

/// DELETE /api/v1/team/members/{id}
pub async fn remove_member(
    State(state): State<AppState>,
    RequireAuth(context): RequireAuth,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let membership = state
        .team
        .remove_member(context.tenant_id, TeamMemberId(id))
        .await?;
    Ok((
        StatusCode::NO_CONTENT,
        Extension(AffectedResource(membership.member_id)),
    ))
}

// ============================================================================
// Invitations
// ============================================================================

/// POST /api/v1/team/invitations
pub async fn invite_member(
    State(state): State<AppState>,
    RequireAuth(context): RequireAuth,
    Json(req): Json<InviteRequest>,
) -> ApiResult<impl IntoResponse> {
    let created = state
        .team
        .invite_member(context.tenant_id, context.personal_id, &req.email, req.role)
        .await?;

    let id = created.invitation.id;
    Ok((
        StatusCode::CREATED,
        Extension(AffectedResource(id)),
        Json(InvitationResponse::from(created.invitation)),
    ))
}

/// GET /api/v1/team/invitations
pub async fn list_invitations(
    State(state): State<AppState>,
    RequireAuth(context): RequireAuth,
) -> ApiResult<Json<Vec<InvitationResponse>>> {
    let invitations = state.team.list_pending_invitations(context.tenant_id).await?;
    Ok(Json(invitations.into_iter().map(Into::into).collect()))
}

/// DELETE /api/v1/team/invitations/{id}
pub async fn cancel_invitation(
    State(state): State<AppState>,
    RequireAuth(context): RequireAuth,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state
        .team
        .cancel_invitation(context.tenant_id, InvitationId(id))
        .await?;
    Ok((StatusCode::NO_CONTENT, Extension(AffectedResource(id))))
}

/// POST /api/v1/team/invitations/accept
///
/// Acts for the authenticating identity, not the tenant it currently
/// resolves to.
pub async fn accept_invitation(
    State(state): State<AppState>,
    RequireAuth(context): RequireAuth,
    Json(req): Json<AcceptRequest>,
) -> ApiResult<(StatusCode, Json<MemberResponse>)> {
    let membership = state
        .team
        .accept_invitation(&req.token, context.personal_id)
        .await?;
    Ok((StatusCode::CREATED, Json(membership.into())))
}
