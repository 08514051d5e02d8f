//! Error types for fdsync-db.

use miette::Diagnostic;
use thiserror::Error;

/// Database error type for fdsync-db operations.
#[derive(Error, Diagnostic, Debug)]
pub enum DbError {
    #[error("Database connection failed: {0}")]
    #[diagnostic(
        code(fdsync_db::connection),
        help("Check if the database file exists and is accessible")
    )]
    ConnectionError(String),

    #[error("Database query failed: {0}")]
    #[diagnostic(code(fdsync_db::query))]
    QueryError(String),

    #[error("Database migration failed: {0}")]
    #[diagnostic(
        code(fdsync_db::migration),
        help("The database schema may be corrupted. Try removing it and syncing again.")
    )]
    MigrationError(String),

    #[error("Repository not found: {0}")]
    #[diagnostic(
        code(fdsync_db::not_found),
        help("Run 'fdsync repos' to list known repositories")
    )]
    NotFound(String),

    #[error("Repository already exists: {0}")]
    #[diagnostic(
        code(fdsync_db::already_exists),
        help("Use 'fdsync edit' to change an existing repository")
    )]
    AlreadyExists(String),

    #[error("Database integrity error: {0}")]
    #[diagnostic(
        code(fdsync_db::integrity),
        help("The database may be corrupted. Try removing it and syncing again.")
    )]
    IntegrityError(String),
}

impl From<diesel::result::Error> for DbError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => DbError::NotFound("Record not found".to_string()),
            diesel::result::Error::DatabaseError(_, info) => {
                DbError::QueryError(info.message().to_string())
            }
            other => DbError::QueryError(other.to_string()),
        }
    }
}

impl From<diesel::result::ConnectionError> for DbError {
    fn from(err: diesel::result::ConnectionError) -> Self {
        DbError::ConnectionError(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::IntegrityError(err.to_string())
    }
}

/// Result type alias for fdsync-db operations.
pub type Result<T> = std::result::Result<T, DbError>;
