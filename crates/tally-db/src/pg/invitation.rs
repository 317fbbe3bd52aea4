//! PostgreSQL team invitation repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use tally_types::{AccountId, InvitationId};

use crate::error::{DbError, DbResult};
use crate::models::TeamInvitationRow;
use crate::repo::{CreateInvitation, TeamInvitationRepository};

/// PostgreSQL team invitation repository
#[derive(Clone)]
pub struct PgTeamInvitationRepository {
    pool: PgPool,
}

impl PgTeamInvitationRepository {
    /// Create a new invitation repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TeamInvitationRepository for PgTeamInvitationRepository {
    async fn create(&self, invitation: CreateInvitation) -> DbResult<TeamInvitationRow> {
        sqlx::query_as::<_, TeamInvitationRow>(
            r#"
            INSERT INTO team_invitations
                (id, owner_id, email, role, token_hash, invited_by, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, owner_id, email, role, token_hash, invited_by,
                      created_at, expires_at, accepted_at
            "#,
        )
        .bind(invitation.id.0)
        .bind(invitation.owner_id.0)
        .bind(&invitation.email)
        .bind(invitation.role.as_str())
        .bind(&invitation.token_hash)
        .bind(invitation.invited_by.0)
        .bind(invitation.created_at)
        .bind(invitation.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from_write(e, "invitation"))
    }

    async fn find_by_id(&self, id: InvitationId) -> DbResult<Option<TeamInvitationRow>> {
        let row = sqlx::query_as::<_, TeamInvitationRow>(
            r#"
            SELECT id, owner_id, email, role, token_hash, invited_by,
                   created_at, expires_at, accepted_at
            FROM team_invitations
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> DbResult<Option<TeamInvitationRow>> {
        let row = sqlx::query_as::<_, TeamInvitationRow>(
            r#"
            SELECT id, owner_id, email, role, token_hash, invited_by,
                   created_at, expires_at, accepted_at
            FROM team_invitations
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_pending_by_owner(
        &self,
        owner: AccountId,
        now: DateTime<Utc>,
    ) -> DbResult<Vec<TeamInvitationRow>> {
        let rows = sqlx::query_as::<_, TeamInvitationRow>(
            r#"
            SELECT id, owner_id, email, role, token_hash, invited_by,
                   created_at, expires_at, accepted_at
            FROM team_invitations
            WHERE owner_id = $1 AND accepted_at IS NULL AND expires_at > $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner.0)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn find_pending_by_owner_and_email(
        &self,
        owner: AccountId,
        email: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<TeamInvitationRow>> {
        let row = sqlx::query_as::<_, TeamInvitationRow>(
            r#"
            SELECT id, owner_id, email, role, token_hash, invited_by,
                   created_at, expires_at, accepted_at
            FROM team_invitations
            WHERE owner_id = $1 AND lower(email) = lower($2)
              AND accepted_at IS NULL AND expires_at > $3
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(owner.0)
        .bind(email)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn mark_accepted(&self, id: InvitationId, at: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE team_invitations
            SET accepted_at = $2
            WHERE id = $1 AND accepted_at IS NULL
            "#,
        )
        .bind(id.0)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn unmark_accepted(&self, id: InvitationId) -> DbResult<()> {
        let result = sqlx::query("UPDATE team_invitations SET accepted_at = NULL WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: InvitationId) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM team_invitations WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> DbResult<Vec<TeamInvitationRow>> {
        let rows = sqlx::query_as::<_, TeamInvitationRow>(
            r#"
            DELETE FROM team_invitations
            WHERE accepted_at IS NULL AND expires_at <= $1
            RETURNING id, owner_id, email, role, token_hash, invited_by,
                      created_at, expires_at, accepted_at
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
