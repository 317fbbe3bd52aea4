//! PostgreSQL team membership repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use tally_types::{AccountId, MemberRole, TeamMemberId};

use crate::error::{DbError, DbResult};
use crate::models::TeamMemberRow;
use crate::repo::{CreateTeamMember, TeamMemberRepository};

/// PostgreSQL team membership repository
#[derive(Clone)]
pub struct PgTeamMemberRepository {
    pool: PgPool,
}

impl PgTeamMemberRepository {
    /// Create a new team membership repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TeamMemberRepository for PgTeamMemberRepository {
    async fn find_external_memberships(&self, member: AccountId) -> DbResult<Vec<TeamMemberRow>> {
        let rows = sqlx::query_as::<_, TeamMemberRow>(
            r#"
            SELECT id, owner_id, member_id, role, invited_by, invited_at, accepted_at
            FROM team_members
            WHERE member_id = $1 AND owner_id <> member_id
            ORDER BY invited_at ASC
            "#,
        )
        .bind(member.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn find_by_owner(&self, owner: AccountId) -> DbResult<Vec<TeamMemberRow>> {
        let rows = sqlx::query_as::<_, TeamMemberRow>(
            r#"
            SELECT id, owner_id, member_id, role, invited_by, invited_at, accepted_at
            FROM team_members
            WHERE owner_id = $1
            ORDER BY invited_at ASC
            "#,
        )
        .bind(owner.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn find_by_id(&self, id: TeamMemberId) -> DbResult<Option<TeamMemberRow>> {
        let row = sqlx::query_as::<_, TeamMemberRow>(
            r#"
            SELECT id, owner_id, member_id, role, invited_by, invited_at, accepted_at
            FROM team_members
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_by_owner_and_member(
        &self,
        owner: AccountId,
        member: AccountId,
    ) -> DbResult<Option<TeamMemberRow>> {
        let row = sqlx::query_as::<_, TeamMemberRow>(
            r#"
            SELECT id, owner_id, member_id, role, invited_by, invited_at, accepted_at
            FROM team_members
            WHERE owner_id = $1 AND member_id = $2
            "#,
        )
        .bind(owner.0)
        .bind(member.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn create(&self, member: CreateTeamMember) -> DbResult<TeamMemberRow> {
        sqlx::query_as::<_, TeamMemberRow>(
            r#"
            INSERT INTO team_members (id, owner_id, member_id, role, invited_by, invited_at, accepted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, owner_id, member_id, role, invited_by, invited_at, accepted_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(member.owner_id.0)
        .bind(member.member_id.0)
        .bind(member.role.as_str())
        .bind(member.invited_by.0)
        .bind(member.invited_at)
        .bind(member.accepted_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from_write(e, "team membership"))
    }

    async fn update_role(&self, id: TeamMemberId, role: MemberRole) -> DbResult<()> {
        let result = sqlx::query("UPDATE team_members SET role = $2 WHERE id = $1")
            .bind(id.0)
            .bind(role.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: TeamMemberId) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM team_members WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}
