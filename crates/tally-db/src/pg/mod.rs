//! PostgreSQL repository implementations

mod account;
mod invitation;
mod subscription;
mod team_member;
mod usage;

use std::sync::Arc;

pub use account::PgAccountRepository;
pub use invitation::PgTeamInvitationRepository;
pub use subscription::PgSubscriptionRepository;
pub use team_member::PgTeamMemberRepository;
pub use usage::PgUsageRepository;

use crate::repo::Stores;
use crate::DbPool;

/// All repositories bundled together
#[derive(Clone)]
pub struct Repositories {
    pub accounts: PgAccountRepository,
    pub members: PgTeamMemberRepository,
    pub invitations: PgTeamInvitationRepository,
    pub subscriptions: PgSubscriptionRepository,
    pub usage: PgUsageRepository,
}

impl Repositories {
    /// Create all repositories from a database pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            accounts: PgAccountRepository::new(pool.clone()),
            members: PgTeamMemberRepository::new(pool.clone()),
            invitations: PgTeamInvitationRepository::new(pool.clone()),
            subscriptions: PgSubscriptionRepository::new(pool.clone()),
            usage: PgUsageRepository::new(pool),
        }
    }
}

impl From<Repositories> for Stores {
    fn from(repos: Repositories) -> Self {
        Self {
            accounts: Arc::new(repos.accounts),
            members: Arc::new(repos.members),
            invitations: Arc::new(repos.invitations),
            subscriptions: Arc::new(repos.subscriptions),
            usage: Arc::new(repos.usage),
        }
    }
}
