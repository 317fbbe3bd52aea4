//! Tally Types - Shared domain types
//!
//! This crate contains the closed vocabulary used across Tally services:
//! - Account, membership and subscription identifiers
//! - The linear member role hierarchy
//! - Resource types, plan limits and feature flags
//! - Subscription, usage period and tenant context types

pub mod error;
pub mod ids;
pub mod plan;
pub mod resource;
pub mod role;
pub mod subscription;
pub mod tenant;
pub mod usage;

pub use error::*;
pub use ids::*;
pub use plan::*;
pub use resource::*;
pub use role::*;
pub use subscription::*;
pub use tenant::*;
pub use usage::*;
