//! Subscription plans: numeric limits and boolean feature flags

use serde::{Deserialize, Serialize};

use crate::{ParseError, PlanId, ResourceType};

/// A per-period resource limit. `-1` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Limit(pub i64);

impl Limit {
    /// Sentinel for "no limit"
    pub const UNLIMITED: Limit = Limit(-1);

    /// Create a finite limit
    pub const fn max(value: i64) -> Self {
        Self(value)
    }

    pub const fn is_unlimited(&self) -> bool {
        self.0 == Self::UNLIMITED.0
    }

    /// Whether one more unit fits on top of `current`
    pub const fn allows(&self, current: i64) -> bool {
        self.is_unlimited() || current < self.0
    }

    /// Units left before the limit is reached, `None` when unlimited
    pub fn remaining(&self, current: i64) -> Option<i64> {
        if self.is_unlimited() {
            None
        } else {
            Some((self.0 - current).max(0))
        }
    }
}

impl std::fmt::Display for Limit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unlimited() {
            f.write_str("unlimited")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Numeric limits of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub max_organizations: Limit,
    pub max_qr_codes: Limit,
    pub max_feedbacks_per_month: Limit,
    pub max_team_members: Limit,
}

impl PlanLimits {
    /// Limits with every resource unlimited
    pub const fn unlimited() -> Self {
        Self {
            max_organizations: Limit::UNLIMITED,
            max_qr_codes: Limit::UNLIMITED,
            max_feedbacks_per_month: Limit::UNLIMITED,
            max_team_members: Limit::UNLIMITED,
        }
    }

    /// Limit that applies to a resource type.
    ///
    /// Locations are not limited on their own.
    pub const fn limit_for(&self, resource: ResourceType) -> Limit {
        match resource {
            ResourceType::Organization => self.max_organizations,
            ResourceType::Location => Limit::UNLIMITED,
            ResourceType::QrCode => self.max_qr_codes,
            ResourceType::Feedback => self.max_feedbacks_per_month,
            ResourceType::TeamMember => self.max_team_members,
        }
    }
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// Boolean capabilities gated by plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanFeature {
    BasicAnalytics,
    AdvancedAnalytics,
    FeedbackExplorer,
    CustomBranding,
    PrioritySupport,
}

impl PlanFeature {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BasicAnalytics => "basic_analytics",
            Self::AdvancedAnalytics => "advanced_analytics",
            Self::FeedbackExplorer => "feedback_explorer",
            Self::CustomBranding => "custom_branding",
            Self::PrioritySupport => "priority_support",
        }
    }
}

impl std::fmt::Display for PlanFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlanFeature {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic_analytics" => Ok(Self::BasicAnalytics),
            "advanced_analytics" => Ok(Self::AdvancedAnalytics),
            "feedback_explorer" => Ok(Self::FeedbackExplorer),
            "custom_branding" => Ok(Self::CustomBranding),
            "priority_support" => Ok(Self::PrioritySupport),
            _ => Err(ParseError::Feature(s.to_string())),
        }
    }
}

/// Feature flags of a plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanFlags {
    #[serde(rename = "has_basic_analytics")]
    pub basic_analytics: bool,
    #[serde(rename = "has_advanced_analytics")]
    pub advanced_analytics: bool,
    #[serde(rename = "has_feedback_explorer")]
    pub feedback_explorer: bool,
    #[serde(rename = "has_custom_branding")]
    pub custom_branding: bool,
    #[serde(rename = "has_priority_support")]
    pub priority_support: bool,
}

impl PlanFlags {
    pub const fn has(&self, feature: PlanFeature) -> bool {
        match feature {
            PlanFeature::BasicAnalytics => self.basic_analytics,
            PlanFeature::AdvancedAnalytics => self.advanced_analytics,
            PlanFeature::FeedbackExplorer => self.feedback_explorer,
            PlanFeature::CustomBranding => self.custom_branding,
            PlanFeature::PrioritySupport => self.priority_support,
        }
    }
}

/// A priced bundle of limits and flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: PlanId,
    /// Stable machine name (e.g. `starter`)
    pub name: String,
    pub display_name: String,
    pub price_cents: i64,
    pub limits: PlanLimits,
    pub flags: PlanFlags,
}

impl SubscriptionPlan {
    /// Capture the plan's limits and flags for embedding in a token
    pub fn snapshot(&self) -> FeatureSnapshot {
        FeatureSnapshot {
            limits: self.limits,
            flags: self.flags,
        }
    }
}

/// Point-in-time copy of a plan's limits and flags, carried inside tokens
/// for checks that must not hit the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    #[serde(flatten)]
    pub limits: PlanLimits,
    #[serde(flatten)]
    pub flags: PlanFlags,
}

impl FeatureSnapshot {
    pub const fn has(&self, feature: PlanFeature) -> bool {
        self.flags.has(feature)
    }

    pub const fn limit_for(&self, resource: ResourceType) -> Limit {
        self.limits.limit_for(resource)
    }
}
