//! Application state for the Tally API service.

use std::sync::Arc;

use tally_auth_core::{AccountService, TeamService, TokenIssuer, TracingInvitationSender};
use tally_billing_core::{QuotaGate, UsageAccountant, UsageRecorder};
use tally_axum::GuardState;
use tally_db::{DbPool, Stores};

use crate::config::Config;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub team: TeamService,
    pub issuer: TokenIssuer,
    pub quota: QuotaGate,
    pub usage: UsageAccountant,
    /// State of the authentication and quota middleware
    pub guard: GuardState,
    /// Database pool (readiness checks)
    pub pool: DbPool,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire every service over the same stores
    pub fn new(
        stores: &Stores,
        pool: DbPool,
        recorder: UsageRecorder,
        config: Config,
    ) -> anyhow::Result<Self> {
        let issuer = TokenIssuer::new(&config.auth, stores)?;
        let accounts = AccountService::new(&config.auth, stores, issuer.clone())?;
        let team = TeamService::new(&config.auth, stores, Arc::new(TracingInvitationSender))?;
        let quota = QuotaGate::new(stores);
        let guard = GuardState::new(issuer.clone(), quota.clone(), recorder);

        Ok(Self {
            accounts,
            team,
            issuer,
            quota,
            usage: UsageAccountant::new(stores),
            guard,
            pool,
            config: Arc::new(config),
        })
    }

    /// Get request timeout from config
    pub fn request_timeout(&self) -> std::time::Duration {
        self.config.request_timeout
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
