//! Permission model: one URL pattern + HTTP method pair

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Id;

/// Permission entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub id: Id,
    pub url: String,
    pub method: String,
    pub label: String,
    pub descr: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New permission creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPermission {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub descr: String,
}

/// Permission update payload
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdatePermission {
    pub url: Option<String>,
    pub method: Option<String>,
    pub label: Option<String>,
    pub descr: Option<String>,
}
