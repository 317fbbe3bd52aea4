//! Database errors

use thiserror::Error;

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Record not found
    #[error("record not found")]
    NotFound,

    /// Unique constraint violated
    #[error("conflict: {0}")]
    Conflict(String),

    /// Stored value outside the closed vocabulary of the domain
    #[error("invalid stored data: {0}")]
    InvalidData(String),
}

impl DbError {
    /// Map an insert/update failure, turning unique violations into [`DbError::Conflict`]
    pub fn from_write(err: sqlx::Error, what: &str) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                tracing::debug!(
                    what,
                    constraint = db_err.constraint().unwrap_or_default(),
                    "Unique constraint rejected write"
                );
                Self::Conflict(format!("{what} already exists"))
            }
            _ => {
                tracing::error!(what, error = %err, "Database write failed");
                Self::Sqlx(err)
            }
        }
    }
}

impl From<tally_types::ParseError> for DbError {
    fn from(err: tally_types::ParseError) -> Self {
        Self::InvalidData(err.to_string())
    }
}

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_write_keeps_non_constraint_errors() {
        let err = DbError::from_write(sqlx::Error::RowNotFound, "invitation");
        assert!(matches!(err, DbError::Sqlx(sqlx::Error::RowNotFound)));
    }
}
