//! Role model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Button, Id, Menu, Permission};

/// Role entity
///
/// The three association lists are direct grants; nothing here is
/// expanded through menu or button inheritance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Id,
    pub name: String,
    pub descr: String,
    pub permissions: Vec<Permission>,
    pub menus: Vec<Menu>,
    pub buttons: Vec<Button>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New role creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRole {
    pub name: String,
    #[serde(default)]
    pub descr: String,
    #[serde(default)]
    pub permission_ids: Vec<Id>,
    #[serde(default)]
    pub menu_ids: Vec<Id>,
    #[serde(default)]
    pub button_ids: Vec<Id>,
}

/// Role update payload
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateRole {
    pub name: Option<String>,
    pub descr: Option<String>,
    pub permission_ids: Option<Vec<Id>>,
    pub menu_ids: Option<Vec<Id>>,
    pub button_ids: Option<Vec<Id>>,
}
