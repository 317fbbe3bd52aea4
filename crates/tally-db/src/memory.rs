//! In-memory repositories for tests
//!
//! DashMap-backed implementations of every repository trait, with the same
//! uniqueness rules the PostgreSQL schema enforces.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use tally_types::{
    AccountId, InvitationId, MemberRole, PlanFlags, PlanId, PlanLimits, ResourceType,
    Subscription, SubscriptionId, SubscriptionPlan, SubscriptionStatus, SubscriptionUsage,
    TeamMemberId, UsageEvent, UsagePeriod,
};

use crate::error::{DbError, DbResult};
use crate::models::{AccountRow, TeamInvitationRow, TeamMemberRow};
use crate::repo::*;

/// In-memory account repository
#[derive(Default, Clone)]
pub struct MemoryAccountRepository {
    accounts: Arc<DashMap<Uuid, AccountRow>>,
}

impl MemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an account directly
    pub fn insert(&self, account: AccountRow) {
        self.accounts.insert(account.id, account);
    }

    /// Snapshot of a stored account
    pub fn get(&self, id: AccountId) -> Option<AccountRow> {
        self.accounts.get(&id.0).map(|r| r.value().clone())
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn find_by_id(&self, id: AccountId) -> DbResult<Option<AccountRow>> {
        Ok(self.get(id))
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<AccountRow>> {
        Ok(self
            .accounts
            .iter()
            .find(|r| r.email.eq_ignore_ascii_case(email))
            .map(|r| r.value().clone()))
    }

    async fn create(&self, account: CreateAccount) -> DbResult<AccountRow> {
        if self
            .accounts
            .iter()
            .any(|r| r.email.eq_ignore_ascii_case(&account.email))
        {
            return Err(DbError::Conflict("account already exists".to_string()));
        }

        let now = Utc::now();
        let row = AccountRow {
            id: account.id.0,
            email: account.email,
            password_hash: account.password_hash,
            name: account.name,
            is_active: true,
            email_verified: account.email_verified,
            deactivation_requested_at: None,
            created_at: now,
            updated_at: now,
        };
        self.accounts.insert(row.id, row.clone());
        Ok(row)
    }

    async fn set_deactivation_requested(
        &self,
        id: AccountId,
        requested_at: Option<DateTime<Utc>>,
    ) -> DbResult<()> {
        let mut entry = self.accounts.get_mut(&id.0).ok_or(DbError::NotFound)?;
        entry.deactivation_requested_at = requested_at;
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn deactivate_requested_before(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let mut count = 0;
        for mut entry in self.accounts.iter_mut() {
            let due = entry
                .deactivation_requested_at
                .is_some_and(|at| at <= cutoff);
            if entry.is_active && due {
                entry.is_active = false;
                entry.updated_at = Utc::now();
                count += 1;
            }
        }
        Ok(count)
    }
}

/// In-memory team membership repository
#[derive(Default, Clone)]
pub struct MemoryTeamMemberRepository {
    members: Arc<DashMap<Uuid, TeamMemberRow>>,
}

impl MemoryTeamMemberRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a membership directly, bypassing uniqueness checks
    pub fn insert(&self, row: TeamMemberRow) {
        self.members.insert(row.id, row);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn sorted(mut rows: Vec<TeamMemberRow>) -> Vec<TeamMemberRow> {
        rows.sort_by_key(|r| r.invited_at);
        rows
    }
}

#[async_trait]
impl TeamMemberRepository for MemoryTeamMemberRepository {
    async fn find_external_memberships(&self, member: AccountId) -> DbResult<Vec<TeamMemberRow>> {
        let rows = self
            .members
            .iter()
            .filter(|r| r.member_id == member.0 && r.owner_id != r.member_id)
            .map(|r| r.value().clone())
            .collect();
        Ok(Self::sorted(rows))
    }

    async fn find_by_owner(&self, owner: AccountId) -> DbResult<Vec<TeamMemberRow>> {
        let rows = self
            .members
            .iter()
            .filter(|r| r.owner_id == owner.0)
            .map(|r| r.value().clone())
            .collect();
        Ok(Self::sorted(rows))
    }

    async fn find_by_id(&self, id: TeamMemberId) -> DbResult<Option<TeamMemberRow>> {
        Ok(self.members.get(&id.0).map(|r| r.value().clone()))
    }

    async fn find_by_owner_and_member(
        &self,
        owner: AccountId,
        member: AccountId,
    ) -> DbResult<Option<TeamMemberRow>> {
        Ok(self
            .members
            .iter()
            .find(|r| r.owner_id == owner.0 && r.member_id == member.0)
            .map(|r| r.value().clone()))
    }

    async fn create(&self, member: CreateTeamMember) -> DbResult<TeamMemberRow> {
        let external = member.owner_id != member.member_id;
        let clash = self.members.iter().any(|r| {
            (r.owner_id == member.owner_id.0 && r.member_id == member.member_id.0)
                || (external && r.member_id == member.member_id.0 && r.owner_id != r.member_id)
        });
        if clash {
            return Err(DbError::Conflict("team membership already exists".to_string()));
        }

        let row = TeamMemberRow {
            id: Uuid::new_v4(),
            owner_id: member.owner_id.0,
            member_id: member.member_id.0,
            role: member.role.as_str().to_string(),
            invited_by: member.invited_by.0,
            invited_at: member.invited_at,
            accepted_at: member.accepted_at,
        };
        self.members.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_role(&self, id: TeamMemberId, role: MemberRole) -> DbResult<()> {
        let mut entry = self.members.get_mut(&id.0).ok_or(DbError::NotFound)?;
        entry.role = role.as_str().to_string();
        Ok(())
    }

    async fn delete(&self, id: TeamMemberId) -> DbResult<()> {
        self.members
            .remove(&id.0)
            .map(|_| ())
            .ok_or(DbError::NotFound)
    }
}

/// In-memory team invitation repository
#[derive(Default, Clone)]
pub struct MemoryTeamInvitationRepository {
    invitations: Arc<DashMap<Uuid, TeamInvitationRow>>,
}

impl MemoryTeamInvitationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an invitation directly
    pub fn insert(&self, row: TeamInvitationRow) {
        self.invitations.insert(row.id, row);
    }

    pub fn get(&self, id: InvitationId) -> Option<TeamInvitationRow> {
        self.invitations.get(&id.0).map(|r| r.value().clone())
    }
}

#[async_trait]
impl TeamInvitationRepository for MemoryTeamInvitationRepository {
    async fn create(&self, invitation: CreateInvitation) -> DbResult<TeamInvitationRow> {
        if self
            .invitations
            .iter()
            .any(|r| r.token_hash == invitation.token_hash)
        {
            return Err(DbError::Conflict("invitation already exists".to_string()));
        }

        let row = TeamInvitationRow {
            id: invitation.id.0,
            owner_id: invitation.owner_id.0,
            email: invitation.email,
            role: invitation.role.as_str().to_string(),
            token_hash: invitation.token_hash,
            invited_by: invitation.invited_by.0,
            created_at: invitation.created_at,
            expires_at: invitation.expires_at,
            accepted_at: None,
        };
        self.invitations.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: InvitationId) -> DbResult<Option<TeamInvitationRow>> {
        Ok(self.get(id))
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> DbResult<Option<TeamInvitationRow>> {
        Ok(self
            .invitations
            .iter()
            .find(|r| r.token_hash == token_hash)
            .map(|r| r.value().clone()))
    }

    async fn find_pending_by_owner(
        &self,
        owner: AccountId,
        now: DateTime<Utc>,
    ) -> DbResult<Vec<TeamInvitationRow>> {
        let mut rows: Vec<TeamInvitationRow> = self
            .invitations
            .iter()
            .filter(|r| r.owner_id == owner.0 && r.is_valid_at(now))
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by_key(|r| std::cmp::Reverse(r.created_at));
        Ok(rows)
    }

    async fn find_pending_by_owner_and_email(
        &self,
        owner: AccountId,
        email: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<TeamInvitationRow>> {
        Ok(self
            .find_pending_by_owner(owner, now)
            .await?
            .into_iter()
            .find(|r| r.email.eq_ignore_ascii_case(email)))
    }

    async fn mark_accepted(&self, id: InvitationId, at: DateTime<Utc>) -> DbResult<bool> {
        let Some(mut entry) = self.invitations.get_mut(&id.0) else {
            return Ok(false);
        };
        if entry.accepted_at.is_some() {
            return Ok(false);
        }
        entry.accepted_at = Some(at);
        Ok(true)
    }

    async fn unmark_accepted(&self, id: InvitationId) -> DbResult<()> {
        let mut entry = self.invitations.get_mut(&id.0).ok_or(DbError::NotFound)?;
        entry.accepted_at = None;
        Ok(())
    }

    async fn delete(&self, id: InvitationId) -> DbResult<()> {
        self.invitations
            .remove(&id.0)
            .map(|_| ())
            .ok_or(DbError::NotFound)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> DbResult<Vec<TeamInvitationRow>> {
        let expired: Vec<Uuid> = self
            .invitations
            .iter()
            .filter(|r| r.accepted_at.is_none() && r.is_expired_at(now))
            .map(|r| r.id)
            .collect();
        Ok(expired
            .into_iter()
            .filter_map(|id| self.invitations.remove(&id).map(|(_, row)| row))
            .collect())
    }
}

/// In-memory subscription repository
#[derive(Default, Clone)]
pub struct MemorySubscriptionRepository {
    subscriptions: Arc<DashMap<Uuid, Subscription>>,
}

impl MemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a subscription
    pub fn insert(&self, subscription: Subscription) {
        self.subscriptions.insert(subscription.id.0, subscription);
    }
}

#[async_trait]
impl SubscriptionRepository for MemorySubscriptionRepository {
    async fn find_by_id(&self, id: SubscriptionId) -> DbResult<Option<Subscription>> {
        Ok(self.subscriptions.get(&id.0).map(|r| r.value().clone()))
    }

    async fn find_by_account_id(&self, account_id: AccountId) -> DbResult<Option<Subscription>> {
        Ok(self
            .subscriptions
            .iter()
            .filter(|r| r.account_id == account_id)
            .max_by_key(|r| r.created_at)
            .map(|r| r.value().clone()))
    }

    async fn find_active(&self, now: DateTime<Utc>) -> DbResult<Vec<Subscription>> {
        Ok(self
            .subscriptions
            .iter()
            .filter(|r| r.is_active_at(now))
            .map(|r| r.value().clone())
            .collect())
    }
}

type UsageKey = (SubscriptionId, DateTime<Utc>, DateTime<Utc>);

/// In-memory usage repository
#[derive(Default, Clone)]
pub struct MemoryUsageRepository {
    rows: Arc<DashMap<UsageKey, SubscriptionUsage>>,
    events: Arc<DashMap<Uuid, UsageEvent>>,
}

impl MemoryUsageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a usage row directly
    pub fn insert(&self, usage: SubscriptionUsage) {
        let key = (usage.subscription_id, usage.period_start, usage.period_end);
        self.rows.insert(key, usage);
    }

    /// Number of usage rows stored for a subscription
    pub fn row_count(&self, subscription_id: SubscriptionId) -> usize {
        self.rows
            .iter()
            .filter(|r| r.subscription_id == subscription_id)
            .count()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Recorded usage events, oldest first
    pub fn events(&self) -> Vec<UsageEvent> {
        let mut events: Vec<UsageEvent> = self.events.iter().map(|e| e.value().clone()).collect();
        events.sort_by_key(|e| e.created_at);
        events
    }
}

#[async_trait]
impl UsageRepository for MemoryUsageRepository {
    async fn find_by_period(
        &self,
        subscription_id: SubscriptionId,
        period: UsagePeriod,
    ) -> DbResult<Option<SubscriptionUsage>> {
        let key = (subscription_id, period.start, period.end);
        Ok(self.rows.get(&key).map(|r| r.value().clone()))
    }

    async fn initialize_period(
        &self,
        subscription_id: SubscriptionId,
        period: UsagePeriod,
    ) -> DbResult<bool> {
        let key = (subscription_id, period.start, period.end);
        let mut created = false;
        self.rows.entry(key).or_insert_with(|| {
            created = true;
            SubscriptionUsage::empty(subscription_id, period)
        });
        Ok(created)
    }

    async fn increment(
        &self,
        subscription_id: SubscriptionId,
        period: UsagePeriod,
        resource: ResourceType,
        delta: i64,
        at: DateTime<Utc>,
    ) -> DbResult<SubscriptionUsage> {
        let key = (subscription_id, period.start, period.end);
        let mut entry = self
            .rows
            .entry(key)
            .or_insert_with(|| SubscriptionUsage::empty(subscription_id, period));
        entry.apply_delta(resource, delta, at);
        Ok(entry.value().clone())
    }

    async fn record_event(&self, event: NewUsageEvent) -> DbResult<UsageEvent> {
        let event = UsageEvent {
            id: Uuid::new_v4(),
            subscription_id: event.subscription_id,
            event_type: event.event_type,
            resource_type: event.resource_type,
            resource_id: event.resource_id,
            created_at: Utc::now(),
        };
        self.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn list_events(
        &self,
        subscription_id: SubscriptionId,
        limit: i64,
    ) -> DbResult<Vec<UsageEvent>> {
        let mut events: Vec<UsageEvent> = self
            .events
            .iter()
            .filter(|r| r.subscription_id == subscription_id)
            .map(|r| r.value().clone())
            .collect();
        events.sort_by_key(|e| std::cmp::Reverse(e.created_at));
        events.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(events)
    }
}

/// Concrete in-memory repositories, kept alongside their [`Stores`] view so
/// tests can seed and inspect state directly.
#[derive(Default, Clone)]
pub struct MemoryStores {
    pub accounts: MemoryAccountRepository,
    pub members: MemoryTeamMemberRepository,
    pub invitations: MemoryTeamInvitationRepository,
    pub subscriptions: MemorySubscriptionRepository,
    pub usage: MemoryUsageRepository,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trait-object view sharing the same underlying maps
    pub fn stores(&self) -> Stores {
        Stores {
            accounts: Arc::new(self.accounts.clone()),
            members: Arc::new(self.members.clone()),
            invitations: Arc::new(self.invitations.clone()),
            subscriptions: Arc::new(self.subscriptions.clone()),
            usage: Arc::new(self.usage.clone()),
        }
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Seed an active, verified account
    pub fn seed_account(&self, email: &str, password_hash: &str) -> AccountRow {
        let now = Utc::now();
        let row = AccountRow {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            name: email.split('@').next().unwrap_or_default().to_string(),
            is_active: true,
            email_verified: true,
            deactivation_requested_at: None,
            created_at: now,
            updated_at: now,
        };
        self.accounts.insert(row.clone());
        row
    }

    /// Seed an accepted membership of `member` in `owner`'s team
    pub fn seed_membership(
        &self,
        owner: AccountId,
        member: AccountId,
        role: MemberRole,
    ) -> TeamMemberRow {
        let now = Utc::now();
        let row = TeamMemberRow {
            id: Uuid::new_v4(),
            owner_id: owner.0,
            member_id: member.0,
            role: role.as_str().to_string(),
            invited_by: owner.0,
            invited_at: now,
            accepted_at: Some(now),
        };
        self.members.insert(row.clone());
        row
    }

    /// Seed a subscription whose 30-day period started yesterday
    pub fn seed_subscription(
        &self,
        account: AccountId,
        plan: SubscriptionPlan,
        status: SubscriptionStatus,
    ) -> Subscription {
        let start = Utc::now() - chrono::Duration::days(1);
        let subscription = Subscription {
            id: SubscriptionId::new(),
            account_id: account,
            plan,
            status,
            current_period_start: start,
            current_period_end: start + chrono::Duration::days(30),
            cancel_at: None,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            created_at: start,
        };
        self.subscriptions.insert(subscription.clone());
        subscription
    }
}

/// A plan with the given limits and flags
pub fn plan(name: &str, limits: PlanLimits, flags: PlanFlags) -> SubscriptionPlan {
    SubscriptionPlan {
        id: PlanId::new(),
        name: name.to_string(),
        display_name: name.to_string(),
        price_cents: 0,
        limits,
        flags,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn period() -> UsagePeriod {
        let start = Utc::now();
        UsagePeriod {
            start,
            end: start + Duration::days(30),
        }
    }

    #[tokio::test]
    async fn test_initialize_period_is_idempotent() {
        let repo = MemoryUsageRepository::new();
        let sub = SubscriptionId::new();
        let p = period();

        assert!(repo.initialize_period(sub, p).await.unwrap());
        assert!(!repo.initialize_period(sub, p).await.unwrap());
        assert_eq!(repo.row_count(sub), 1);
    }

    #[tokio::test]
    async fn test_increment_creates_single_row() {
        let repo = MemoryUsageRepository::new();
        let sub = SubscriptionId::new();
        let p = period();

        repo.increment(sub, p, ResourceType::QrCode, 1, Utc::now())
            .await
            .unwrap();
        let usage = repo
            .increment(sub, p, ResourceType::QrCode, 1, Utc::now())
            .await
            .unwrap();

        assert_eq!(usage.qr_codes_count, 2);
        assert_eq!(repo.row_count(sub), 1);
    }

    #[tokio::test]
    async fn test_second_external_membership_conflicts() {
        let repo = MemoryTeamMemberRepository::new();
        let member = AccountId::new();
        let input = |owner: AccountId| CreateTeamMember {
            owner_id: owner,
            member_id: member,
            role: MemberRole::Viewer,
            invited_by: owner,
            invited_at: Utc::now(),
            accepted_at: Some(Utc::now()),
        };

        repo.create(input(AccountId::new())).await.unwrap();
        let err = repo.create(input(AccountId::new())).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    fn invitation(owner: AccountId, token_hash: &str, expires_in: Duration) -> CreateInvitation {
        CreateInvitation {
            id: InvitationId::new(),
            owner_id: owner,
            email: "m@example.com".to_string(),
            role: MemberRole::Manager,
            token_hash: token_hash.to_string(),
            invited_by: owner,
            created_at: Utc::now(),
            expires_at: Utc::now() + expires_in,
        }
    }

    #[tokio::test]
    async fn test_mark_accepted_is_single_use() {
        let repo = MemoryTeamInvitationRepository::new();
        let row = repo
            .create(invitation(AccountId::new(), "abc", Duration::days(7)))
            .await
            .unwrap();

        assert!(repo.mark_accepted(row.invitation_id(), Utc::now()).await.unwrap());
        assert!(!repo.mark_accepted(row.invitation_id(), Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_unmark_accepted_reopens_claim() {
        let repo = MemoryTeamInvitationRepository::new();
        let row = repo
            .create(invitation(AccountId::new(), "abc", Duration::days(7)))
            .await
            .unwrap();

        assert!(repo.mark_accepted(row.invitation_id(), Utc::now()).await.unwrap());
        repo.unmark_accepted(row.invitation_id()).await.unwrap();
        assert!(repo.get(row.invitation_id()).unwrap().accepted_at.is_none());
        assert!(repo.mark_accepted(row.invitation_id(), Utc::now()).await.unwrap());

        let missing = repo.unmark_accepted(InvitationId::new()).await.unwrap_err();
        assert!(matches!(missing, DbError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_expired_returns_purged_rows() {
        let repo = MemoryTeamInvitationRepository::new();
        let owner = AccountId::new();
        let expired = repo
            .create(invitation(owner, "old", -Duration::hours(1)))
            .await
            .unwrap();
        let live = repo
            .create(invitation(owner, "new", Duration::days(7)))
            .await
            .unwrap();
        let accepted = repo
            .create(invitation(owner, "done", -Duration::hours(1)))
            .await
            .unwrap();
        repo.mark_accepted(accepted.invitation_id(), Utc::now())
            .await
            .unwrap();

        let purged = repo.delete_expired(Utc::now()).await.unwrap();
        assert_eq!(purged.len(), 1);
        assert_eq!(purged[0].id, expired.id);
        assert_eq!(purged[0].owner_id, owner.0);
        assert!(repo.get(expired.invitation_id()).is_none());
        assert!(repo.get(live.invitation_id()).is_some());
        assert!(repo.get(accepted.invitation_id()).is_some());
    }
}
