//! Periodic maintenance: usage period rollover, deferred account
//! deactivation and expired invitation cleanup.
//!
//! Purged invitations give their team-member seat back, the same way a
//! cancelled one does.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use tally_auth_core::{AccountService, TeamService};
use tally_billing_core::{QuotaGate, UsageAccountant, UsageJob};
use tally_db::TeamInvitationRow;
use tally_types::ResourceType;

/// What one sweep did. A step that failed reports `None`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub usage_periods: Option<usize>,
    pub deactivated: Option<u64>,
    pub invitations_purged: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct Maintenance {
    quota: QuotaGate,
    usage: UsageAccountant,
    accounts: AccountService,
    team: TeamService,
}

impl Maintenance {
    pub fn new(
        quota: QuotaGate,
        usage: UsageAccountant,
        accounts: AccountService,
        team: TeamService,
    ) -> Self {
        Self {
            quota,
            usage,
            accounts,
            team,
        }
    }

    /// Run every step once. Steps are independent; one failing does not
    /// skip the others.
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let usage_periods = match self.usage.reset_monthly_usage(now).await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::error!(error = %e, "Usage period rollover failed");
                None
            }
        };

        let deactivated = match self.accounts.process_pending_deactivations(now).await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::error!(error = %e, "Pending deactivation sweep failed");
                None
            }
        };

        let invitations_purged = match self.team.purge_expired_invitations().await {
            Ok(purged) => {
                for invitation in &purged {
                    self.release_seat(invitation).await;
                }
                Some(purged.len())
            }
            Err(e) => {
                tracing::error!(error = %e, "Expired invitation purge failed");
                None
            }
        };

        let report = SweepReport {
            usage_periods,
            deactivated,
            invitations_purged,
        };
        tracing::debug!(?report, "Maintenance sweep finished");
        report
    }

    async fn release_seat(&self, invitation: &TeamInvitationRow) {
        let subscription = match self.quota.subscription_for(invitation.owner_id()).await {
            Ok(Some(subscription)) => subscription,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(
                    invitation_id = %invitation.id,
                    error = %e,
                    "Could not resolve subscription for purged invitation"
                );
                return;
            }
        };

        // Seats taken in an earlier period went away with its counters
        if !subscription.current_period().contains(invitation.created_at) {
            return;
        }

        let job = UsageJob::deleted(subscription.id, ResourceType::TeamMember)
            .with_resource_id(invitation.id);
        if let Err(e) = self.usage.apply(&job).await {
            tracing::warn!(
                invitation_id = %invitation.id,
                subscription_id = %subscription.id,
                error = %e,
                "Failed to release seat of purged invitation"
            );
        }
    }

    /// Sweep on a fixed interval until `shutdown` flips to true
    pub fn spawn(self, every: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep(Utc::now()).await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("Maintenance task stopped");
        })
    }
}
