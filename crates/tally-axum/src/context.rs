//! Authentication context types.
//!
//! The [`AuthContext`] carries the two identities every handler must keep
//! apart: the personal identity that authenticated, and the tenant whose
//! resources the request operates on.

use tally_auth_core::Claims;
use tally_types::{AccountId, FeatureSnapshot, MemberRole, PlanFeature, TenantContext};

/// Per-request authenticated context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Account that owns the presented credentials.
    pub personal_id: AccountId,
    /// Account whose resources, quotas and usage this request touches.
    pub tenant_id: AccountId,
    /// Role within the tenant.
    pub role: MemberRole,
    pub name: String,
    pub email: String,
    /// Plan snapshot from the token, if it still applies to `tenant_id`.
    pub features: Option<FeatureSnapshot>,
}

impl AuthContext {
    /// Combine validated claims with a tenant resolved for this request.
    ///
    /// The token's snapshot describes the tenant at issuance time; it is
    /// dropped when the request now resolves to a different tenant.
    #[must_use]
    pub fn from_claims(claims: Claims, tenant: TenantContext) -> Self {
        let features = if tenant.tenant_id == claims.account_id {
            claims.subscription_features
        } else {
            tracing::debug!(
                member_id = %tenant.personal_id,
                token_tenant = %claims.account_id,
                tenant_id = %tenant.tenant_id,
                "Tenant changed since issuance, ignoring token snapshot"
            );
            None
        };

        Self {
            personal_id: tenant.personal_id,
            tenant_id: tenant.tenant_id,
            role: tenant.role,
            name: claims.name,
            email: claims.email,
            features,
        }
    }

    #[must_use]
    pub fn tenant(&self) -> TenantContext {
        TenantContext {
            personal_id: self.personal_id,
            tenant_id: self.tenant_id,
            role: self.role,
        }
    }

    /// Acting for another account as an invited member.
    #[must_use]
    pub fn is_team_member(&self) -> bool {
        self.personal_id != self.tenant_id
    }

    /// Role at or above `required`.
    #[must_use]
    pub fn has_role(&self, required: MemberRole) -> bool {
        self.role.satisfies(required)
    }

    /// Feature flag from the snapshot; absent snapshot means no features.
    #[must_use]
    pub fn has_feature(&self, feature: PlanFeature) -> bool {
        self.features.is_some_and(|f| f.has(feature))
    }
}

#[cfg(test)]
mod tests {
    use tally_types::{PlanFlags, PlanLimits};

    use super::*;

    fn claims(tenant: AccountId, member: AccountId) -> Claims {
        Claims {
            account_id: tenant,
            member_id: member,
            name: "Member".to_string(),
            email: "member@example.com".to_string(),
            role: MemberRole::Manager,
            subscription_features: Some(FeatureSnapshot {
                limits: PlanLimits::unlimited(),
                flags: PlanFlags {
                    advanced_analytics: true,
                    ..PlanFlags::default()
                },
            }),
            iat: 0,
            nbf: 0,
            exp: 1,
            iss: "tally".to_string(),
            sub: member.to_string(),
        }
    }

    #[test]
    fn test_snapshot_kept_for_same_tenant() {
        let (owner, member) = (AccountId::new(), AccountId::new());
        let ctx = AuthContext::from_claims(
            claims(owner, member),
            TenantContext::delegated(member, owner, MemberRole::Manager),
        );

        assert!(ctx.is_team_member());
        assert!(ctx.has_feature(PlanFeature::AdvancedAnalytics));
        assert!(!ctx.has_feature(PlanFeature::CustomBranding));
        assert!(ctx.has_role(MemberRole::Viewer));
        assert!(!ctx.has_role(MemberRole::Admin));
    }

    #[test]
    fn test_snapshot_dropped_when_tenant_changes() {
        let (owner, member) = (AccountId::new(), AccountId::new());
        // Removed from the team since the token was issued
        let ctx = AuthContext::from_claims(claims(owner, member), TenantContext::own(member));

        assert_eq!(ctx.tenant_id, member);
        assert_eq!(ctx.role, MemberRole::Owner);
        assert!(ctx.features.is_none());
        assert!(!ctx.has_feature(PlanFeature::AdvancedAnalytics));
    }
}
