//! Typed identifiers
//!
//! Every persisted entity gets its own newtype over [`Uuid`] so a tenant id
//! can never be passed where a personal account id or subscription id is
//! expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse an ID from a string
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// The underlying UUID
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

typed_id!(
    /// Unique account identifier. Used both for personal identities and for
    /// tenants, since a tenant is simply the account owning the resources.
    AccountId
);

typed_id!(
    /// Unique team membership identifier
    TeamMemberId
);

typed_id!(
    /// Unique team invitation identifier
    InvitationId
);

typed_id!(
    /// Unique subscription identifier
    SubscriptionId
);

typed_id!(
    /// Unique subscription plan identifier
    PlanId
);

typed_id!(
    /// Unique usage period row identifier
    UsageId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        let id = AccountId::new();
        let parsed = AccountId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(SubscriptionId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn test_serde_transparent() {
        let uuid = Uuid::new_v4();
        let json = serde_json::to_string(&AccountId(uuid)).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));
    }
}
