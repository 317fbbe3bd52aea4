//! Common test utilities for tally-auth-core integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tally_auth_core::{
    AccountService, AuthConfig, AuthError, InvitationNotice, InvitationSender, TeamService,
    TokenIssuer,
};
use tally_db::memory::{plan, MemoryStores, MemoryTeamMemberRepository};
use tally_db::{
    AccountRow, CreateTeamMember, DbError, DbResult, TeamMemberRepository, TeamMemberRow,
};
use tally_types::{
    AccountId, Limit, MemberRole, PlanFlags, PlanLimits, SubscriptionPlan, TeamMemberId,
};

pub const SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const PASSWORD: &str = "correct horse battery staple";

/// Sender that keeps every notice for inspection
#[derive(Default, Clone)]
pub struct RecordingSender {
    notices: Arc<Mutex<Vec<InvitationNotice>>>,
}

impl RecordingSender {
    pub fn notices(&self) -> Vec<InvitationNotice> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl InvitationSender for RecordingSender {
    async fn send_invitation(&self, notice: &InvitationNotice) -> Result<(), AuthError> {
        self.notices.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

/// Membership store whose writes always fail
#[derive(Clone)]
pub struct FailingMemberWrites(pub MemoryTeamMemberRepository);

#[async_trait]
impl TeamMemberRepository for FailingMemberWrites {
    async fn find_external_memberships(&self, member: AccountId) -> DbResult<Vec<TeamMemberRow>> {
        self.0.find_external_memberships(member).await
    }

    async fn find_by_owner(&self, owner: AccountId) -> DbResult<Vec<TeamMemberRow>> {
        self.0.find_by_owner(owner).await
    }

    async fn find_by_id(&self, id: TeamMemberId) -> DbResult<Option<TeamMemberRow>> {
        self.0.find_by_id(id).await
    }

    async fn find_by_owner_and_member(
        &self,
        owner: AccountId,
        member: AccountId,
    ) -> DbResult<Option<TeamMemberRow>> {
        self.0.find_by_owner_and_member(owner, member).await
    }

    async fn create(&self, _member: CreateTeamMember) -> DbResult<TeamMemberRow> {
        Err(DbError::Conflict(
            "member already belongs to another team".to_string(),
        ))
    }

    async fn update_role(&self, id: TeamMemberId, role: MemberRole) -> DbResult<()> {
        self.0.update_role(id, role).await
    }

    async fn delete(&self, id: TeamMemberId) -> DbResult<()> {
        self.0.delete(id).await
    }
}

/// Services wired over shared in-memory stores
pub struct Harness {
    pub stores: MemoryStores,
    pub config: AuthConfig,
    pub issuer: TokenIssuer,
    pub team: TeamService,
    pub accounts: AccountService,
    pub sender: RecordingSender,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(AuthConfig::new(SECRET).unwrap())
    }

    pub fn with_config(config: AuthConfig) -> Self {
        let stores = MemoryStores::new();
        let view = stores.stores();
        let sender = RecordingSender::default();
        let issuer = TokenIssuer::new(&config, &view).unwrap();
        let team = TeamService::new(&config, &view, Arc::new(sender.clone())).unwrap();
        let accounts = AccountService::new(&config, &view, issuer.clone()).unwrap();

        Self {
            stores,
            config,
            issuer,
            team,
            accounts,
            sender,
        }
    }

    /// A team service over the same stores but a different membership store
    pub fn team_with_members(&self, members: Arc<dyn TeamMemberRepository>) -> TeamService {
        let mut view = self.stores.stores();
        view.members = members;
        TeamService::new(&self.config, &view, Arc::new(self.sender.clone())).unwrap()
    }

    /// Seed an active, verified account whose password is [`PASSWORD`]
    pub fn account(&self, email: &str) -> AccountRow {
        let hash = bcrypt::hash(PASSWORD, 4).unwrap();
        self.stores.seed_account(email, &hash)
    }
}

/// Two organizations, unlimited everything else, basic analytics only
pub fn starter_plan() -> SubscriptionPlan {
    plan(
        "starter",
        PlanLimits {
            max_organizations: Limit::max(2),
            ..PlanLimits::unlimited()
        },
        PlanFlags {
            basic_analytics: true,
            ..PlanFlags::default()
        },
    )
}
