//! Menu model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Id, Permission, double_option};

/// Display metadata stored as JSON next to the menu row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MenuMeta {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub icon: String,
}

/// Menu entity
///
/// `parent_id` forms a tree over menus; `permissions` are direct grants
/// and are loaded together with the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Menu {
    pub id: Id,
    pub path: String,
    pub component: String,
    pub name: String,
    pub meta: MenuMeta,
    pub arrange_order: i32,
    pub is_active: bool,
    pub descr: String,
    pub parent_id: Option<Id>,
    pub permissions: Vec<Permission>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New menu creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMenu {
    pub path: String,
    pub component: String,
    pub name: String,
    #[serde(default)]
    pub meta: MenuMeta,
    #[serde(default)]
    pub arrange_order: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub descr: String,
    #[serde(default)]
    pub parent_id: Option<Id>,
    #[serde(default)]
    pub permission_ids: Vec<Id>,
}

/// Menu update payload
///
/// `parent_id: Some(None)` detaches the menu from its parent,
/// `permission_ids: Some(vec![])` clears its permissions.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateMenu {
    pub path: Option<String>,
    pub component: Option<String>,
    pub name: Option<String>,
    pub meta: Option<MenuMeta>,
    pub arrange_order: Option<i32>,
    pub is_active: Option<bool>,
    pub descr: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<Id>>,
    pub permission_ids: Option<Vec<Id>>,
}

pub(crate) fn default_active() -> bool {
    true
}
