//! Database row models
//!
//! These types map directly to database rows using SQLx's FromRow derive.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use tally_types::{
    AccountId, InvitationId, Limit, MemberRole, ParseError, PlanFlags, PlanId, PlanLimits,
    SubscriptionId, SubscriptionPlan, SubscriptionUsage, TeamMemberId, UsageEvent, UsageId,
};

/// Account row from the database
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub is_active: bool,
    pub email_verified: bool,
    pub deactivation_requested_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountRow {
    pub fn account_id(&self) -> AccountId {
        AccountId(self.id)
    }

    /// Name shown in tokens and team listings; falls back to the email
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }

    pub fn is_pending_deactivation(&self) -> bool {
        self.deactivation_requested_at.is_some()
    }

    /// When a pending deactivation takes effect
    pub fn deactivation_date(&self, grace: Duration) -> Option<DateTime<Utc>> {
        self.deactivation_requested_at.map(|at| at + grace)
    }

    /// Whether the sweep should deactivate this account at `now`
    pub fn is_due_for_deactivation(&self, grace: Duration, now: DateTime<Utc>) -> bool {
        self.is_active
            && self
                .deactivation_date(grace)
                .is_some_and(|date| date <= now)
    }
}

/// Team membership row from the database
#[derive(Debug, Clone, FromRow)]
pub struct TeamMemberRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub member_id: Uuid,
    pub role: String,
    pub invited_by: Uuid,
    pub invited_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl TeamMemberRow {
    pub fn team_member_id(&self) -> TeamMemberId {
        TeamMemberId(self.id)
    }

    pub fn owner_id(&self) -> AccountId {
        AccountId(self.owner_id)
    }

    pub fn member_id(&self) -> AccountId {
        AccountId(self.member_id)
    }

    /// Stored role, rejected if outside the role vocabulary
    pub fn role(&self) -> Result<MemberRole, ParseError> {
        self.role.parse()
    }

    /// A row granting an identity access to its own resources
    pub fn is_self_membership(&self) -> bool {
        self.owner_id == self.member_id
    }
}

/// Team invitation row from the database
#[derive(Debug, Clone, FromRow)]
pub struct TeamInvitationRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub email: String,
    pub role: String,
    pub token_hash: String,
    pub invited_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl TeamInvitationRow {
    pub fn invitation_id(&self) -> InvitationId {
        InvitationId(self.id)
    }

    pub fn owner_id(&self) -> AccountId {
        AccountId(self.owner_id)
    }

    pub fn role(&self) -> Result<MemberRole, ParseError> {
        self.role.parse()
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Redeemable: not yet accepted and not expired
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_accepted() && !self.is_expired_at(now)
    }
}

/// Subscription plan row from the database
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionPlanRow {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub price_cents: i64,
    pub max_organizations: i64,
    pub max_qr_codes: i64,
    pub max_feedbacks_per_month: i64,
    pub max_team_members: i64,
    pub has_basic_analytics: bool,
    pub has_advanced_analytics: bool,
    pub has_feedback_explorer: bool,
    pub has_custom_branding: bool,
    pub has_priority_support: bool,
}

impl From<SubscriptionPlanRow> for SubscriptionPlan {
    fn from(row: SubscriptionPlanRow) -> Self {
        Self {
            id: PlanId(row.id),
            name: row.name,
            display_name: row.display_name,
            price_cents: row.price_cents,
            limits: PlanLimits {
                max_organizations: Limit(row.max_organizations),
                max_qr_codes: Limit(row.max_qr_codes),
                max_feedbacks_per_month: Limit(row.max_feedbacks_per_month),
                max_team_members: Limit(row.max_team_members),
            },
            flags: PlanFlags {
                basic_analytics: row.has_basic_analytics,
                advanced_analytics: row.has_advanced_analytics,
                feedback_explorer: row.has_feedback_explorer,
                custom_branding: row.has_custom_branding,
                priority_support: row.has_priority_support,
            },
        }
    }
}

/// Subscription row from the database
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub plan_id: Uuid,
    pub status: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at: Option<DateTime<Utc>>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionRow {
    /// Combine with the plan row into the domain subscription
    pub fn into_subscription(
        self,
        plan: SubscriptionPlanRow,
    ) -> Result<tally_types::Subscription, ParseError> {
        Ok(tally_types::Subscription {
            id: SubscriptionId(self.id),
            account_id: AccountId(self.account_id),
            plan: plan.into(),
            status: self.status.parse()?,
            current_period_start: self.current_period_start,
            current_period_end: self.current_period_end,
            cancel_at: self.cancel_at,
            stripe_customer_id: self.stripe_customer_id,
            stripe_subscription_id: self.stripe_subscription_id,
            created_at: self.created_at,
        })
    }
}

/// Usage period row from the database
#[derive(Debug, Clone, FromRow)]
pub struct UsageRow {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub organizations_count: i64,
    pub locations_count: i64,
    pub qr_codes_count: i64,
    pub feedbacks_count: i64,
    pub team_members_count: i64,
    pub last_updated_at: DateTime<Utc>,
}

impl From<UsageRow> for SubscriptionUsage {
    fn from(row: UsageRow) -> Self {
        Self {
            id: UsageId(row.id),
            subscription_id: SubscriptionId(row.subscription_id),
            period_start: row.period_start,
            period_end: row.period_end,
            organizations_count: row.organizations_count,
            locations_count: row.locations_count,
            qr_codes_count: row.qr_codes_count,
            feedbacks_count: row.feedbacks_count,
            team_members_count: row.team_members_count,
            last_updated_at: row.last_updated_at,
        }
    }
}

/// Usage event row from the database
#[derive(Debug, Clone, FromRow)]
pub struct UsageEventRow {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub event_type: String,
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<UsageEventRow> for UsageEvent {
    type Error = ParseError;

    fn try_from(row: UsageEventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            subscription_id: SubscriptionId(row.subscription_id),
            event_type: row.event_type.parse()?,
            resource_type: row.resource_type.parse()?,
            resource_id: row.resource_id,
            created_at: row.created_at,
        })
    }
}
