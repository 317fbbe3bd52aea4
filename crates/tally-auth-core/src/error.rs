//! Auth errors

use thiserror::Error;

use tally_types::MemberRole;

/// Authentication, authorization and team management errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Token malformed, forged or expired. Causes are deliberately not
    /// distinguished.
    #[error("invalid token")]
    InvalidToken,

    /// Wrong email or password
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Account has been deactivated
    #[error("account is deactivated")]
    AccountInactive,

    /// Email address not verified yet
    #[error("email not verified")]
    EmailNotVerified,

    /// Account not found
    #[error("account not found")]
    AccountNotFound,

    /// Role below the required minimum
    #[error("Insufficient privileges for this operation")]
    InsufficientRole {
        required: MemberRole,
        actual: MemberRole,
    },

    /// Action reserved to owners or otherwise not permitted
    #[error("{0}")]
    Forbidden(String),

    /// Team membership not found
    #[error("team member not found")]
    MemberNotFound,

    /// Invitation not found
    #[error("invitation not found")]
    InvitationNotFound,

    /// Invitation is past its expiry
    #[error("invitation has expired")]
    InvitationExpired,

    /// Accepting account does not match the invited email
    #[error("invitation was sent to a different email address")]
    EmailMismatch,

    /// Duplicate membership, invitation or redemption
    #[error("{0}")]
    Conflict(String),

    /// Malformed input
    #[error("{0}")]
    Validation(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidToken | Self::InvalidCredentials => 401,
            Self::AccountInactive
            | Self::EmailNotVerified
            | Self::InsufficientRole { .. }
            | Self::Forbidden(_)
            | Self::EmailMismatch => 403,
            Self::AccountNotFound | Self::MemberNotFound | Self::InvitationNotFound => 404,
            Self::Conflict(_) => 409,
            Self::InvitationExpired => 410,
            Self::Validation(_) => 400,
            Self::Database(_) | Self::Configuration(_) | Self::Internal(_) => 500,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidToken => "TOKEN_INVALID",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AccountInactive => "ACCOUNT_INACTIVE",
            Self::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            Self::AccountNotFound => "ACCOUNT_NOT_FOUND",
            Self::InsufficientRole { .. } => "INSUFFICIENT_ROLE",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::MemberNotFound => "MEMBER_NOT_FOUND",
            Self::InvitationNotFound => "INVITATION_NOT_FOUND",
            Self::InvitationExpired => "INVITATION_EXPIRED",
            Self::EmailMismatch => "EMAIL_MISMATCH",
            Self::Conflict(_) => "CONFLICT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the cause must stay out of client responses
    pub fn is_internal(&self) -> bool {
        self.status_code() >= 500
    }
}

impl From<tally_db::DbError> for AuthError {
    fn from(err: tally_db::DbError) -> Self {
        match err {
            tally_db::DbError::Conflict(what) => Self::Conflict(what),
            err => {
                tracing::error!("Database error: {}", err);
                Self::Database(err.to_string())
            }
        }
    }
}
