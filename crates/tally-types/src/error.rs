//! Common error types

use thiserror::Error;

/// Error parsing one of the closed string vocabularies at a boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Unknown member role
    #[error("invalid role: {0}")]
    Role(String),

    /// Unknown resource type
    #[error("invalid resource type: {0}")]
    ResourceType(String),

    /// Unknown usage event type
    #[error("invalid usage event type: {0}")]
    EventType(String),

    /// Unknown subscription status
    #[error("invalid subscription status: {0}")]
    SubscriptionStatus(String),

    /// Unknown plan feature
    #[error("invalid plan feature: {0}")]
    Feature(String),
}
