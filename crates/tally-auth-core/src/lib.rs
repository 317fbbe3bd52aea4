//! Tally Auth Core - Authentication business logic
//!
//! Token issuance and validation, tenant resolution for invited team
//! members, role authorization, team management and account lifecycle.

pub mod account;
pub mod authorize;
pub mod config;
pub mod crypto;
pub mod error;
pub mod invitation;
pub mod team;
pub mod token;

pub use account::{AccountService, LoginOutcome};
pub use authorize::{authorize, authorize_str};
pub use config::AuthConfig;
pub use error::AuthError;
pub use invitation::{
    CreatedInvitation, InvitationNotice, InvitationSender, TeamMemberDetails, TeamService,
    TracingInvitationSender,
};
pub use team::{Membership, TeamResolver};
pub use token::{Claims, IssuedToken, TokenIssuer};
