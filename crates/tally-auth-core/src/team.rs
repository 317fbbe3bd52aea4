//! Tenant resolution for invited team members

use std::sync::Arc;

use tally_db::{TeamMemberRepository, TeamMemberRow};
use tally_types::{AccountId, MemberRole, TenantContext};

use crate::AuthError;

/// A resolved external membership
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Membership {
    pub owner_id: AccountId,
    pub role: MemberRole,
}

/// Maps an authenticating identity to the tenant whose resources it acts on.
///
/// Results are never cached: membership and roles can change between
/// requests.
#[derive(Clone)]
pub struct TeamResolver {
    members: Arc<dyn TeamMemberRepository>,
}

impl TeamResolver {
    pub fn new(members: Arc<dyn TeamMemberRepository>) -> Self {
        Self { members }
    }

    /// The membership through which `identity` acts for another account.
    ///
    /// Self-memberships are ignored. Rows with a role outside the role
    /// vocabulary are skipped, so a corrupt row never grants access. If
    /// several rows qualify, the oldest wins.
    pub async fn resolve_membership(
        &self,
        identity: AccountId,
    ) -> Result<Option<Membership>, AuthError> {
        let rows = self.members.find_external_memberships(identity).await?;
        if rows.len() > 1 {
            tracing::warn!(
                member_id = %identity,
                count = rows.len(),
                "Identity has several external memberships, using the oldest"
            );
        }

        Ok(rows.iter().find_map(|row| Self::usable(identity, row)))
    }

    /// `(owner, role)` when acting for another account, `(identity, Owner)`
    /// otherwise
    pub async fn resource_tenant_for(&self, identity: AccountId) -> Result<TenantContext, AuthError> {
        Ok(match self.resolve_membership(identity).await? {
            Some(membership) => {
                TenantContext::delegated(identity, membership.owner_id, membership.role)
            }
            None => TenantContext::own(identity),
        })
    }

    fn usable(identity: AccountId, row: &TeamMemberRow) -> Option<Membership> {
        if row.is_self_membership() || row.member_id() != identity {
            return None;
        }
        match row.role() {
            Ok(role) => Some(Membership {
                owner_id: row.owner_id(),
                role,
            }),
            Err(e) => {
                tracing::warn!(
                    membership_id = %row.id,
                    error = %e,
                    "Skipping membership with unknown role"
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for TeamResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeamResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use tally_db::memory::MemoryStores;

    use super::*;

    fn resolver(stores: &MemoryStores) -> TeamResolver {
        TeamResolver::new(stores.stores().members)
    }

    #[tokio::test]
    async fn test_no_membership_resolves_to_self() {
        let stores = MemoryStores::new();
        let me = AccountId::new();

        let tenant = resolver(&stores).resource_tenant_for(me).await.unwrap();
        assert_eq!(tenant, TenantContext::own(me));
        assert_eq!(tenant.role, MemberRole::Owner);
    }

    #[tokio::test]
    async fn test_self_membership_ignored() {
        let stores = MemoryStores::new();
        let me = AccountId::new();
        stores.seed_membership(me, me, MemberRole::Viewer);

        let tenant = resolver(&stores).resource_tenant_for(me).await.unwrap();
        assert_eq!(tenant.tenant_id, me);
        assert_eq!(tenant.role, MemberRole::Owner);
    }

    #[tokio::test]
    async fn test_unknown_role_row_skipped() {
        let stores = MemoryStores::new();
        let (owner, me) = (AccountId::new(), AccountId::new());
        let mut row = stores.seed_membership(owner, me, MemberRole::Admin);
        row.role = "SUPERUSER".to_string();
        stores.members.insert(row);

        let resolver = resolver(&stores);
        assert_eq!(resolver.resolve_membership(me).await.unwrap(), None);
        assert_eq!(
            resolver.resource_tenant_for(me).await.unwrap(),
            TenantContext::own(me)
        );
    }

    #[tokio::test]
    async fn test_external_membership_resolves_to_owner() {
        let stores = MemoryStores::new();
        let (owner, me) = (AccountId::new(), AccountId::new());
        stores.seed_membership(owner, me, MemberRole::Manager);

        let tenant = resolver(&stores).resource_tenant_for(me).await.unwrap();
        assert_eq!(tenant.tenant_id, owner);
        assert_eq!(tenant.personal_id, me);
        assert_eq!(tenant.role, MemberRole::Manager);
        assert!(tenant.is_team_member());
    }
}
