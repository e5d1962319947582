//! Login record model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Id;

/// One login attempt, successful or not
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LoginRecord {
    pub id: Id,
    pub username: String,
    pub ip_address: String,
    pub user_agent: String,
    pub status: bool,
    pub login_at: DateTime<Utc>,
}

/// New login record payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLoginRecord {
    pub username: String,
    pub ip_address: String,
    pub user_agent: String,
    pub status: bool,
}
