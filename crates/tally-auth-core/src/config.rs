//! Configuration types for auth service

use std::time::Duration;

use crate::AuthError;

/// Auth service configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret used to sign and verify tokens
    pub jwt_secret: String,
    /// `iss` claim written into and required from every token
    pub issuer: String,
    /// Token lifetime
    pub token_ttl: Duration,
    /// How long an invitation stays redeemable
    pub invitation_ttl: Duration,
    /// Delay between a deactivation request and the account being disabled
    pub deactivation_grace: Duration,
}

impl AuthConfig {
    /// Minimum secret length in bytes (256 bits)
    pub const MIN_SECRET_LENGTH: usize = 32;

    /// Create a new auth config.
    ///
    /// # Errors
    /// Returns [`AuthError::Configuration`] if the secret is shorter than
    /// [`Self::MIN_SECRET_LENGTH`] bytes.
    pub fn new(jwt_secret: impl Into<String>) -> Result<Self, AuthError> {
        let jwt_secret = jwt_secret.into();
        if jwt_secret.len() < Self::MIN_SECRET_LENGTH {
            return Err(AuthError::Configuration(format!(
                "JWT secret too short: got {} bytes, need at least {}",
                jwt_secret.len(),
                Self::MIN_SECRET_LENGTH
            )));
        }

        Ok(Self {
            jwt_secret,
            issuer: "tally".to_string(),
            token_ttl: Duration::from_secs(24 * 60 * 60), // 24 hours
            invitation_ttl: Duration::from_secs(7 * 24 * 60 * 60), // 7 days
            deactivation_grace: Duration::from_secs(15 * 24 * 60 * 60), // 15 days
        })
    }

    /// Set the token issuer
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Set token lifetime
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Set invitation lifetime
    pub fn with_invitation_ttl(mut self, ttl: Duration) -> Self {
        self.invitation_ttl = ttl;
        self
    }

    /// Set deactivation grace period
    pub fn with_deactivation_grace(mut self, grace: Duration) -> Self {
        self.deactivation_grace = grace;
        self
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("issuer", &self.issuer)
            .field("token_ttl", &self.token_ttl)
            .field("invitation_ttl", &self.invitation_ttl)
            .field("deactivation_grace", &self.deactivation_grace)
            .finish_non_exhaustive()
    }
}
