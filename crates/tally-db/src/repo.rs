//! Repository traits
//!
//! Define async repository interfaces for database operations. None of these
//! operations compose transactionally with each other.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use tally_types::{
    AccountId, InvitationId, MemberRole, ResourceType, Subscription, SubscriptionId,
    SubscriptionUsage, TeamMemberId, UsageEvent, UsageEventType, UsagePeriod,
};

use crate::error::DbResult;
use crate::models::*;

/// Account repository trait
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Find an account by ID
    async fn find_by_id(&self, id: AccountId) -> DbResult<Option<AccountRow>>;

    /// Find an account by email (case-insensitive)
    async fn find_by_email(&self, email: &str) -> DbResult<Option<AccountRow>>;

    /// Create a new account
    async fn create(&self, account: CreateAccount) -> DbResult<AccountRow>;

    /// Set or clear the pending-deactivation timestamp
    async fn set_deactivation_requested(
        &self,
        id: AccountId,
        requested_at: Option<DateTime<Utc>>,
    ) -> DbResult<()>;

    /// Deactivate every active account whose deactivation was requested at or
    /// before `cutoff`. Returns the number of accounts deactivated.
    async fn deactivate_requested_before(&self, cutoff: DateTime<Utc>) -> DbResult<u64>;
}

/// Create account input
#[derive(Debug, Clone)]
pub struct CreateAccount {
    pub id: AccountId,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub email_verified: bool,
}

/// Team membership repository trait
#[async_trait]
pub trait TeamMemberRepository: Send + Sync {
    /// Memberships where `member` acts for another account (owner != member),
    /// oldest first
    async fn find_external_memberships(&self, member: AccountId) -> DbResult<Vec<TeamMemberRow>>;

    /// All memberships of an owner's team
    async fn find_by_owner(&self, owner: AccountId) -> DbResult<Vec<TeamMemberRow>>;

    /// Find a membership by ID
    async fn find_by_id(&self, id: TeamMemberId) -> DbResult<Option<TeamMemberRow>>;

    /// Find the membership of `member` in `owner`'s team
    async fn find_by_owner_and_member(
        &self,
        owner: AccountId,
        member: AccountId,
    ) -> DbResult<Option<TeamMemberRow>>;

    /// Create a membership. Unique violations surface as `DbError::Conflict`.
    async fn create(&self, member: CreateTeamMember) -> DbResult<TeamMemberRow>;

    /// Change a membership's role
    async fn update_role(&self, id: TeamMemberId, role: MemberRole) -> DbResult<()>;

    /// Delete a membership
    async fn delete(&self, id: TeamMemberId) -> DbResult<()>;
}

/// Create team membership input
#[derive(Debug, Clone)]
pub struct CreateTeamMember {
    pub owner_id: AccountId,
    pub member_id: AccountId,
    pub role: MemberRole,
    pub invited_by: AccountId,
    pub invited_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

/// Team invitation repository trait
#[async_trait]
pub trait TeamInvitationRepository: Send + Sync {
    /// Create an invitation
    async fn create(&self, invitation: CreateInvitation) -> DbResult<TeamInvitationRow>;

    /// Find an invitation by ID
    async fn find_by_id(&self, id: InvitationId) -> DbResult<Option<TeamInvitationRow>>;

    /// Find an invitation by the hash of its secret token
    async fn find_by_token_hash(&self, token_hash: &str) -> DbResult<Option<TeamInvitationRow>>;

    /// Unaccepted, unexpired invitations of an owner's team
    async fn find_pending_by_owner(
        &self,
        owner: AccountId,
        now: DateTime<Utc>,
    ) -> DbResult<Vec<TeamInvitationRow>>;

    /// Unaccepted, unexpired invitation for `email` in an owner's team
    async fn find_pending_by_owner_and_email(
        &self,
        owner: AccountId,
        email: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<TeamInvitationRow>>;

    /// Claim an invitation. Returns `false` if it was already accepted.
    async fn mark_accepted(&self, id: InvitationId, at: DateTime<Utc>) -> DbResult<bool>;

    /// Release a claim taken by [`mark_accepted`](Self::mark_accepted)
    async fn unmark_accepted(&self, id: InvitationId) -> DbResult<()>;

    /// Delete an invitation
    async fn delete(&self, id: InvitationId) -> DbResult<()>;

    /// Delete unaccepted invitations that expired before `now`, returning
    /// the deleted rows
    async fn delete_expired(&self, now: DateTime<Utc>) -> DbResult<Vec<TeamInvitationRow>>;
}

/// Create invitation input
#[derive(Debug, Clone)]
pub struct CreateInvitation {
    pub id: InvitationId,
    pub owner_id: AccountId,
    pub email: String,
    pub role: MemberRole,
    pub token_hash: String,
    pub invited_by: AccountId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Subscription repository trait (read-only to this core)
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find a subscription by ID, plan included
    async fn find_by_id(&self, id: SubscriptionId) -> DbResult<Option<Subscription>>;

    /// Most recent subscription of an account, plan included
    async fn find_by_account_id(&self, account_id: AccountId) -> DbResult<Option<Subscription>>;

    /// Subscriptions that are active at `now`
    async fn find_active(&self, now: DateTime<Utc>) -> DbResult<Vec<Subscription>>;
}

/// Usage repository trait
#[async_trait]
pub trait UsageRepository: Send + Sync {
    /// Usage row of a subscription for one period
    async fn find_by_period(
        &self,
        subscription_id: SubscriptionId,
        period: UsagePeriod,
    ) -> DbResult<Option<SubscriptionUsage>>;

    /// Create the zeroed row for a period if absent. Returns `true` if a row
    /// was created.
    async fn initialize_period(
        &self,
        subscription_id: SubscriptionId,
        period: UsagePeriod,
    ) -> DbResult<bool>;

    /// Atomically add `delta` to one counter, creating the period row if
    /// needed. Counters are clamped at zero.
    async fn increment(
        &self,
        subscription_id: SubscriptionId,
        period: UsagePeriod,
        resource: ResourceType,
        delta: i64,
        at: DateTime<Utc>,
    ) -> DbResult<SubscriptionUsage>;

    /// Append an audit event
    async fn record_event(&self, event: NewUsageEvent) -> DbResult<UsageEvent>;

    /// Latest audit events of a subscription, newest first
    async fn list_events(
        &self,
        subscription_id: SubscriptionId,
        limit: i64,
    ) -> DbResult<Vec<UsageEvent>>;
}

/// New usage event input. The timestamp is assigned on insert.
#[derive(Debug, Clone)]
pub struct NewUsageEvent {
    pub subscription_id: SubscriptionId,
    pub event_type: UsageEventType,
    pub resource_type: ResourceType,
    pub resource_id: Option<Uuid>,
}

/// All repository contracts bundled for injection into services
#[derive(Clone)]
pub struct Stores {
    pub accounts: Arc<dyn AccountRepository>,
    pub members: Arc<dyn TeamMemberRepository>,
    pub invitations: Arc<dyn TeamInvitationRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub usage: Arc<dyn UsageRepository>,
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}
