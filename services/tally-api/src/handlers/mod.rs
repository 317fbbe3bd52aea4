//! HTTP handlers

mod auth;
mod health;
mod team;
mod usage;

pub use auth::{cancel_deactivation, login, me, refresh, request_deactivation};
pub use health::{health, ready};
pub use team::{
    accept_invitation, cancel_invitation, invite_member, list_invitations, list_members,
    remove_member, update_member_role,
};
pub use usage::get_usage;

use tally_axum::ApiError;

pub type ApiResult<T> = Result<T, ApiError>;
