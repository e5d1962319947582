//! Button model: an action that always belongs to one menu

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Id, Permission, menu::default_active};

/// Button entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub id: Id,
    pub name: String,
    pub arrange_order: i32,
    pub is_active: bool,
    pub descr: String,
    pub menu_id: Id,
    pub permissions: Vec<Permission>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New button creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewButton {
    pub name: String,
    pub menu_id: Id,
    #[serde(default)]
    pub arrange_order: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub descr: String,
    #[serde(default)]
    pub permission_ids: Vec<Id>,
}

/// Button update payload
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateButton {
    pub name: Option<String>,
    pub menu_id: Option<Id>,
    pub arrange_order: Option<i32>,
    pub is_active: Option<bool>,
    pub descr: Option<String>,
    pub permission_ids: Option<Vec<Id>>,
}
