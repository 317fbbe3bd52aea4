//! Signed claims: issuance, validation and refresh
//!
//! Tokens are HS256 JWTs carrying the resolved tenant, the authenticating
//! identity, the role and, when the tenant has an active subscription, a
//! snapshot of the plan's limits and flags.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use tally_db::{AccountRepository, AccountRow, Stores, SubscriptionRepository};
use tally_types::{AccountId, FeatureSnapshot, MemberRole, TenantContext};

use crate::{AuthConfig, AuthError, TeamResolver};

/// Claims carried inside a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Tenant the token acts for
    pub account_id: AccountId,
    /// Authenticating identity
    pub member_id: AccountId,
    pub name: String,
    pub email: String,
    pub role: MemberRole,
    /// Plan snapshot; absent when the tenant had no active subscription
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_features: Option<FeatureSnapshot>,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: String,
    pub sub: String,
}

impl Claims {
    /// Tenant context as computed at issuance time
    pub fn tenant(&self) -> TenantContext {
        TenantContext {
            personal_id: self.member_id,
            tenant_id: self.account_id,
            role: self.role,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// A freshly signed token and the claims inside it
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Mints and verifies tokens
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl: chrono::Duration,
    accounts: Arc<dyn AccountRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    resolver: TeamResolver,
}

impl TokenIssuer {
    /// Create a new token issuer.
    ///
    /// # Errors
    /// Returns [`AuthError::Configuration`] if the TTL does not fit a timestamp.
    pub fn new(config: &AuthConfig, stores: &Stores) -> Result<Self, AuthError> {
        let ttl = chrono::Duration::from_std(config.token_ttl)
            .map_err(|e| AuthError::Configuration(format!("token TTL out of range: {e}")))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);
        validation.validate_nbf = true;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            ttl,
            accounts: stores.accounts.clone(),
            subscriptions: stores.subscriptions.clone(),
            resolver: TeamResolver::new(stores.members.clone()),
        })
    }

    // =========================================================================
    // Issuance
    // =========================================================================

    /// Issue a token for an account.
    ///
    /// Never fails because the tenant lacks a subscription; the snapshot is
    /// simply left out. Lookup failures degrade the same way.
    pub async fn issue_token(&self, account: &AccountRow) -> Result<IssuedToken, AuthError> {
        let identity = account.account_id();

        let tenant = match self.resolver.resource_tenant_for(identity).await {
            Ok(tenant) => tenant,
            Err(e) => {
                tracing::warn!(
                    account_id = %identity,
                    error = %e,
                    "Team resolution failed during token issuance, issuing for own tenant"
                );
                TenantContext::own(identity)
            }
        };

        let now = Utc::now();
        let subscription_features = self.snapshot_for(tenant.tenant_id, now).await;

        let claims = Claims {
            account_id: tenant.tenant_id,
            member_id: identity,
            name: account.display_name().to_string(),
            email: account.email.clone(),
            role: tenant.role,
            subscription_features,
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            iss: self.issuer.clone(),
            sub: identity.to_string(),
        };

        let token = self.sign(&claims)?;
        tracing::debug!(
            member_id = %claims.member_id,
            tenant_id = %claims.account_id,
            role = %claims.role,
            has_snapshot = claims.subscription_features.is_some(),
            "Issued token"
        );

        Ok(IssuedToken { token, claims })
    }

    async fn snapshot_for(&self, tenant: AccountId, now: DateTime<Utc>) -> Option<FeatureSnapshot> {
        match self.subscriptions.find_by_account_id(tenant).await {
            Ok(Some(subscription)) if subscription.is_active_at(now) => {
                Some(subscription.plan.snapshot())
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(
                    tenant_id = %tenant,
                    error = %e,
                    "Subscription lookup failed during token issuance"
                );
                None
            }
        }
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("failed to sign token: {e}")))
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Verify signature, issuer and time window.
    ///
    /// Every failure maps to [`AuthError::InvalidToken`].
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token validation failed");
                AuthError::InvalidToken
            })
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Re-issue from the current account record so role and subscription
    /// changes since the original issuance are picked up
    pub async fn refresh_token(&self, token: &str) -> Result<IssuedToken, AuthError> {
        let claims = self.validate_token(token)?;

        let account = self
            .accounts
            .find_by_id(claims.member_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        if !account.is_active {
            return Err(AuthError::AccountInactive);
        }

        self.issue_token(&account).await
    }

    /// Team resolver sharing this issuer's membership store
    pub fn resolver(&self) -> &TeamResolver {
        &self.resolver
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
