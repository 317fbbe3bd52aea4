//! Account lifecycle: login and deferred deactivation

use std::sync::Arc;

use chrono::{DateTime, Utc};

use tally_db::{AccountRepository, AccountRow, Stores};
use tally_types::AccountId;

use crate::crypto::{verify_against_decoy, verify_password};
use crate::{AuthConfig, AuthError, IssuedToken, TokenIssuer};

/// Successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: IssuedToken,
    pub account: AccountRow,
}

/// Account service
#[derive(Clone)]
pub struct AccountService {
    accounts: Arc<dyn AccountRepository>,
    issuer: TokenIssuer,
    deactivation_grace: chrono::Duration,
}

impl AccountService {
    /// Create a new account service
    pub fn new(config: &AuthConfig, stores: &Stores, issuer: TokenIssuer) -> Result<Self, AuthError> {
        let deactivation_grace = chrono::Duration::from_std(config.deactivation_grace)
            .map_err(|e| AuthError::Configuration(format!("deactivation grace out of range: {e}")))?;

        Ok(Self {
            accounts: stores.accounts.clone(),
            issuer,
            deactivation_grace,
        })
    }

    /// Check credentials and issue a token.
    ///
    /// Logging in cancels a pending deactivation.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let Some(mut account) = self.accounts.find_by_email(email.trim()).await? else {
            // Same bcrypt cost as a real mismatch so unknown emails are not
            // distinguishable by response time.
            verify_against_decoy(password).await?;
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &account.password_hash).await? {
            return Err(AuthError::InvalidCredentials);
        }

        if !account.is_active {
            return Err(AuthError::AccountInactive);
        }

        if !account.email_verified {
            return Err(AuthError::EmailNotVerified);
        }

        if account.is_pending_deactivation() {
            self.accounts
                .set_deactivation_requested(account.account_id(), None)
                .await?;
            account.deactivation_requested_at = None;
            tracing::info!(account_id = %account.id, "Pending deactivation cancelled by login");
        }

        let token = self.issuer.issue_token(&account).await?;
        tracing::info!(account_id = %account.id, tenant_id = %token.claims.account_id, "Login succeeded");

        Ok(LoginOutcome { token, account })
    }

    /// Load an account
    pub async fn account(&self, id: AccountId) -> Result<AccountRow, AuthError> {
        self.accounts
            .find_by_id(id)
            .await?
            .ok_or(AuthError::AccountNotFound)
    }

    /// Schedule deactivation after the grace period. Returns the date it
    /// takes effect; repeated requests keep the original date.
    pub async fn request_deactivation(&self, id: AccountId) -> Result<DateTime<Utc>, AuthError> {
        let account = self.account(id).await?;
        if let Some(date) = account.deactivation_date(self.deactivation_grace) {
            return Ok(date);
        }

        let now = Utc::now();
        self.accounts.set_deactivation_requested(id, Some(now)).await?;
        tracing::info!(account_id = %id, "Account deactivation requested");

        Ok(now + self.deactivation_grace)
    }

    /// Withdraw a pending deactivation
    pub async fn cancel_deactivation(&self, id: AccountId) -> Result<(), AuthError> {
        let account = self.account(id).await?;
        if !account.is_pending_deactivation() {
            return Err(AuthError::Validation(
                "no pending deactivation request".to_string(),
            ));
        }

        self.accounts.set_deactivation_requested(id, None).await?;
        tracing::info!(account_id = %id, "Account deactivation cancelled");
        Ok(())
    }

    /// Deactivate every account whose grace period has elapsed at `now`
    pub async fn process_pending_deactivations(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let count = self
            .accounts
            .deactivate_requested_before(now - self.deactivation_grace)
            .await?;
        if count > 0 {
            tracing::info!(count, "Deactivated accounts past their grace period");
        }
        Ok(count)
    }

    pub fn deactivation_grace(&self) -> chrono::Duration {
        self.deactivation_grace
    }
}

impl std::fmt::Debug for AccountService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountService")
            .field("deactivation_grace", &self.deactivation_grace)
            .finish_non_exhaustive()
    }
}
