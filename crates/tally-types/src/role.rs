//! Member role hierarchy
//!
//! Roles are strictly ordered: `Viewer < Manager < Admin < Owner`. A higher
//! role always satisfies a lower requirement; there is no exact-match mode.

use serde::{Deserialize, Serialize};

use crate::ParseError;

/// Role of an identity within a tenant's resource space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    /// Read-only access
    Viewer,
    /// Day-to-day operation of the organization's resources
    Manager,
    /// Team and settings administration
    Admin,
    /// The account owning the resources. Never granted by invitation.
    Owner,
}

impl MemberRole {
    /// All roles, lowest first
    pub const ALL: [MemberRole; 4] = [Self::Viewer, Self::Manager, Self::Admin, Self::Owner];

    /// Numeric level used for comparisons (1-4)
    pub const fn level(&self) -> u8 {
        match self {
            Self::Viewer => 1,
            Self::Manager => 2,
            Self::Admin => 3,
            Self::Owner => 4,
        }
    }

    /// Whether this role meets the given minimum
    pub const fn satisfies(&self, required: MemberRole) -> bool {
        self.level() >= required.level()
    }

    /// Whether this role may be handed out through an invitation or role change
    pub const fn is_assignable(&self) -> bool {
        !matches!(self, Self::Owner)
    }

    /// Canonical string form
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "VIEWER",
            Self::Manager => "MANAGER",
            Self::Admin => "ADMIN",
            Self::Owner => "OWNER",
        }
    }
}

impl PartialOrd for MemberRole {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MemberRole {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.level().cmp(&other.level())
    }
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemberRole {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VIEWER" => Ok(Self::Viewer),
            "MANAGER" => Ok(Self::Manager),
            "ADMIN" => Ok(Self::Admin),
            "OWNER" => Ok(Self::Owner),
            _ => Err(ParseError::Role(s.to_string())),
        }
    }
}
