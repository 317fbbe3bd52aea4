//! Quota-bearing resource types and usage event types

use serde::{Deserialize, Serialize};

use crate::ParseError;

/// Kind of resource whose creation is metered against a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Organization (restaurant, venue)
    #[serde(alias = "restaurant")]
    Organization,
    /// Physical location of an organization
    Location,
    /// QR code pointing at a feedback form
    QrCode,
    /// A single piece of customer feedback
    Feedback,
    /// A collaborator invited into the tenant's team
    TeamMember,
}

impl ResourceType {
    /// All resource types
    pub const ALL: [ResourceType; 5] = [
        Self::Organization,
        Self::Location,
        Self::QrCode,
        Self::Feedback,
        Self::TeamMember,
    ];

    /// Canonical string form
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Location => "location",
            Self::QrCode => "qr_code",
            Self::Feedback => "feedback",
            Self::TeamMember => "team_member",
        }
    }

    /// Human-readable label used in quota messages
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Organization => "Organization",
            Self::Location => "Location",
            Self::QrCode => "QR code",
            Self::Feedback => "Monthly feedback",
            Self::TeamMember => "Team member",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "organization" | "restaurant" => Ok(Self::Organization),
            "location" => Ok(Self::Location),
            "qr_code" => Ok(Self::QrCode),
            "feedback" => Ok(Self::Feedback),
            "team_member" => Ok(Self::TeamMember),
            _ => Err(ParseError::ResourceType(s.to_string())),
        }
    }
}

/// Kind of usage-affecting action recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageEventType {
    Create,
    Delete,
    Update,
}

impl UsageEventType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Update => "update",
        }
    }
}

impl std::fmt::Display for UsageEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UsageEventType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "delete" => Ok(Self::Delete),
            "update" => Ok(Self::Update),
            _ => Err(ParseError::EventType(s.to_string())),
        }
    }
}
