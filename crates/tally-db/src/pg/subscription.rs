//! PostgreSQL subscription repository implementation

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use tally_types::{AccountId, Subscription, SubscriptionId};

use crate::error::{DbError, DbResult};
use crate::models::{SubscriptionPlanRow, SubscriptionRow};
use crate::repo::SubscriptionRepository;

/// PostgreSQL subscription repository
#[derive(Clone)]
pub struct PgSubscriptionRepository {
    pool: PgPool,
}

impl PgSubscriptionRepository {
    /// Create a new subscription repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_plan(&self, plan_id: Uuid) -> DbResult<SubscriptionPlanRow> {
        sqlx::query_as::<_, SubscriptionPlanRow>(
            r#"
            SELECT id, name, display_name, price_cents,
                   max_organizations, max_qr_codes, max_feedbacks_per_month, max_team_members,
                   has_basic_analytics, has_advanced_analytics, has_feedback_explorer,
                   has_custom_branding, has_priority_support
            FROM subscription_plans
            WHERE id = $1
            "#,
        )
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)
    }

    async fn with_plan(&self, row: SubscriptionRow) -> DbResult<Subscription> {
        let plan = self.find_plan(row.plan_id).await?;
        Ok(row.into_subscription(plan)?)
    }
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    async fn find_by_id(&self, id: SubscriptionId) -> DbResult<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT id, account_id, plan_id, status, current_period_start, current_period_end,
                   cancel_at, stripe_customer_id, stripe_subscription_id, created_at, updated_at
            FROM subscriptions
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.with_plan(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_account_id(&self, account_id: AccountId) -> DbResult<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT id, account_id, plan_id, status, current_period_start, current_period_end,
                   cancel_at, stripe_customer_id, stripe_subscription_id, created_at, updated_at
            FROM subscriptions
            WHERE account_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(account_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.with_plan(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_active(&self, now: DateTime<Utc>) -> DbResult<Vec<Subscription>> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT id, account_id, plan_id, status, current_period_start, current_period_end,
                   cancel_at, stripe_customer_id, stripe_subscription_id, created_at, updated_at
            FROM subscriptions
            WHERE status = 'active' AND current_period_end > $1
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        let mut plans: HashMap<Uuid, SubscriptionPlanRow> = HashMap::new();
        let mut subscriptions = Vec::with_capacity(rows.len());
        for row in rows {
            let plan = match plans.get(&row.plan_id) {
                Some(plan) => plan.clone(),
                None => {
                    let plan = self.find_plan(row.plan_id).await?;
                    plans.insert(row.plan_id, plan.clone());
                    plan
                }
            };
            subscriptions.push(row.into_subscription(plan)?);
        }

        Ok(subscriptions)
    }
}
