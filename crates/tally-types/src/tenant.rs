//! Tenant resolution results

use serde::{Deserialize, Serialize};

use crate::{AccountId, MemberRole};

/// Which tenant a request operates against, and with what role.
///
/// `personal_id` is always the authenticating account. `tenant_id` is the
/// account whose resources, quotas and usage the request touches; ownership
/// checks must compare against it, never against `personal_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub personal_id: AccountId,
    pub tenant_id: AccountId,
    pub role: MemberRole,
}

impl TenantContext {
    /// An identity acting on its own resources
    pub const fn own(id: AccountId) -> Self {
        Self {
            personal_id: id,
            tenant_id: id,
            role: MemberRole::Owner,
        }
    }

    /// An identity acting as an invited member of `owner`'s organization
    pub const fn delegated(member: AccountId, owner: AccountId, role: MemberRole) -> Self {
        Self {
            personal_id: member,
            tenant_id: owner,
            role,
        }
    }

    /// Whether the identity is acting for another account
    pub fn is_team_member(&self) -> bool {
        self.personal_id != self.tenant_id
    }
}
