//! Error type for the admin service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::DatabaseError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{menu_tree::MenuTreeError, policy::PolicyError, rate_limiter::LimiterError};

/// Crate-wide error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} already exists")]
    Conflict(String),

    /// Unknown username and wrong password alike
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("user is inactive")]
    UserInactive,

    #[error("account temporarily locked, try again later")]
    AccountLocked,

    #[error("password too weak: {0}")]
    PasswordStrength(String),

    #[error("invalid or expired token")]
    Token,

    #[error("access denied")]
    Forbidden,

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    MenuTree(#[from] MenuTreeError),

    #[error(transparent)]
    Limiter(#[from] LimiterError),

    #[error(transparent)]
    Database(DatabaseError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        if matches!(err, DatabaseError::Query(sqlx::Error::RowNotFound)) {
            return AppError::NotFound("record".to_string());
        }
        if let DatabaseError::Query(sqlx::Error::Database(db)) = &err {
            if db.is_unique_violation() {
                return AppError::Conflict(db.constraint().unwrap_or("record").to_string());
            }
            if db.is_foreign_key_violation() {
                return AppError::Validation("record is still referenced".to_string());
            }
        }
        AppError::Database(err)
    }
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    /// Status code and stable reason code
    pub fn status_and_reason(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_failed"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            AppError::UserInactive => (StatusCode::UNAUTHORIZED, "user_inactive"),
            AppError::AccountLocked => (
                StatusCode::UNAUTHORIZED,
                "account_locked_too_many_attempts",
            ),
            AppError::PasswordStrength(_) => {
                (StatusCode::BAD_REQUEST, "password_strength_failed")
            }
            AppError::Token => (StatusCode::UNAUTHORIZED, "invalid_token"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::Policy(PolicyError::Precheck(_)) => {
                (StatusCode::BAD_REQUEST, "policy_precheck_failed")
            }
            AppError::Policy(PolicyError::Write { reason, .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, reason.code())
            }
            AppError::Policy(PolicyError::Cancelled) | AppError::Limiter(LimiterError::Cancelled) => {
                (StatusCode::SERVICE_UNAVAILABLE, "cancelled")
            }
            AppError::MenuTree(_) => (StatusCode::INTERNAL_SERVER_ERROR, "menu_cycle_detected"),
            AppError::Limiter(LimiterError::Store(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "attempt_store_failed")
            }
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, reason) = self.status_and_reason();

        // Server-side failures are logged in full and rendered generically
        let message = if status.is_server_error() {
            error!(reason, "Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": message,
            "reason": reason,
        }));

        (status, body).into_response()
    }
}

/// Type alias for results of the admin service
pub type AppResult<T> = Result<T, AppError>;
