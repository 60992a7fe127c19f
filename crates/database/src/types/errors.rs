//! Error types for the database layer

use thiserror::Error;

/// General database error
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error("Database query error: {0}")]
    QueryError(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    MigrationError(String),

    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),
}

impl DatabaseError {
    /// True when the failure came from a foreign key constraint,
    /// e.g. a message addressed to a user that does not exist.
    pub fn is_foreign_key_violation(&self) -> bool {
        match self {
            DatabaseError::QueryError(sqlx::Error::Database(db)) => {
                db.message().contains("FOREIGN KEY constraint failed")
            }
            _ => false,
        }
    }
}
