//! PostgreSQL account repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use tally_types::AccountId;

use crate::error::{DbError, DbResult};
use crate::models::AccountRow;
use crate::repo::{AccountRepository, CreateAccount};

/// PostgreSQL account repository
#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    /// Create a new account repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn find_by_id(&self, id: AccountId) -> DbResult<Option<AccountRow>> {
        let account = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, email, password_hash, name, is_active, email_verified,
                   deactivation_requested_at, created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<AccountRow>> {
        let account = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, email, password_hash, name, is_active, email_verified,
                   deactivation_requested_at, created_at, updated_at
            FROM accounts
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn create(&self, account: CreateAccount) -> DbResult<AccountRow> {
        sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO accounts (id, email, password_hash, name, email_verified)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, password_hash, name, is_active, email_verified,
                      deactivation_requested_at, created_at, updated_at
            "#,
        )
        .bind(account.id.0)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.name)
        .bind(account.email_verified)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from_write(e, "account"))
    }

    async fn set_deactivation_requested(
        &self,
        id: AccountId,
        requested_at: Option<DateTime<Utc>>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET deactivation_requested_at = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(requested_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn deactivate_requested_before(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET is_active = FALSE, updated_at = NOW()
            WHERE is_active
              AND deactivation_requested_at IS NOT NULL
              AND deactivation_requested_at <= $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
