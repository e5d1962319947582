//! Error type shared by the storage helpers

use sqlx::{Error as SqlxError, migrate::MigrateError};
use thiserror::Error;

/// Failure of a database operation
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The pool could not reach the server
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// A statement failed; constraint violations arrive here
    #[error("Database query error: {0}")]
    Query(#[from] SqlxError),

    #[error("Database migration error: {0}")]
    Migration(#[from] MigrateError),

    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;
