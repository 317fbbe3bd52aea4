//! PostgreSQL usage repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use tally_types::{ResourceType, SubscriptionId, SubscriptionUsage, UsageEvent, UsagePeriod};

use crate::error::DbResult;
use crate::models::{UsageEventRow, UsageRow};
use crate::repo::{NewUsageEvent, UsageRepository};

/// Counter column for a resource type. Static strings only, never user input.
const fn counter_column(resource: ResourceType) -> &'static str {
    match resource {
        ResourceType::Organization => "organizations_count",
        ResourceType::Location => "locations_count",
        ResourceType::QrCode => "qr_codes_count",
        ResourceType::Feedback => "feedbacks_count",
        ResourceType::TeamMember => "team_members_count",
    }
}

/// PostgreSQL usage repository
#[derive(Clone)]
pub struct PgUsageRepository {
    pool: PgPool,
}

impl PgUsageRepository {
    /// Create a new usage repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageRepository for PgUsageRepository {
    async fn find_by_period(
        &self,
        subscription_id: SubscriptionId,
        period: UsagePeriod,
    ) -> DbResult<Option<SubscriptionUsage>> {
        let row = sqlx::query_as::<_, UsageRow>(
            r#"
            SELECT id, subscription_id, period_start, period_end,
                   organizations_count, locations_count, qr_codes_count,
                   feedbacks_count, team_members_count, last_updated_at
            FROM subscription_usage
            WHERE subscription_id = $1 AND period_start = $2 AND period_end = $3
            "#,
        )
        .bind(subscription_id.0)
        .bind(period.start)
        .bind(period.end)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SubscriptionUsage::from))
    }

    async fn initialize_period(
        &self,
        subscription_id: SubscriptionId,
        period: UsagePeriod,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO subscription_usage (id, subscription_id, period_start, period_end)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (subscription_id, period_start, period_end) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(subscription_id.0)
        .bind(period.start)
        .bind(period.end)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn increment(
        &self,
        subscription_id: SubscriptionId,
        period: UsagePeriod,
        resource: ResourceType,
        delta: i64,
        at: DateTime<Utc>,
    ) -> DbResult<SubscriptionUsage> {
        let column = counter_column(resource);
        let query = format!(
            r#"
            INSERT INTO subscription_usage
                (id, subscription_id, period_start, period_end, {column}, last_updated_at)
            VALUES ($1, $2, $3, $4, GREATEST(0, $5), $6)
            ON CONFLICT (subscription_id, period_start, period_end)
            DO UPDATE SET {column} = GREATEST(0, subscription_usage.{column} + $5),
                          last_updated_at = EXCLUDED.last_updated_at
            RETURNING id, subscription_id, period_start, period_end,
                      organizations_count, locations_count, qr_codes_count,
                      feedbacks_count, team_members_count, last_updated_at
            "#
        );

        let row = sqlx::query_as::<_, UsageRow>(&query)
            .bind(Uuid::new_v4())
            .bind(subscription_id.0)
            .bind(period.start)
            .bind(period.end)
            .bind(delta)
            .bind(at)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    async fn record_event(&self, event: NewUsageEvent) -> DbResult<UsageEvent> {
        let row = sqlx::query_as::<_, UsageEventRow>(
            r#"
            INSERT INTO usage_events (id, subscription_id, event_type, resource_type, resource_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, subscription_id, event_type, resource_type, resource_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event.subscription_id.0)
        .bind(event.event_type.as_str())
        .bind(event.resource_type.as_str())
        .bind(event.resource_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_into()?)
    }

    async fn list_events(
        &self,
        subscription_id: SubscriptionId,
        limit: i64,
    ) -> DbResult<Vec<UsageEvent>> {
        let rows = sqlx::query_as::<_, UsageEventRow>(
            r#"
            SELECT id, subscription_id, event_type, resource_type, resource_id, created_at
            FROM usage_events
            WHERE subscription_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(subscription_id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| UsageEvent::try_from(row).map_err(Into::into))
            .collect()
    }
}
