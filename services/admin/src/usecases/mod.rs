//! Use cases: persistence followed by policy synchronization
//!
//! Every mutation commits the relational change first and then updates the
//! enforcer. A policy failure is surfaced to the caller with the data already
//! committed; [`PolicyReloader::reload_all`] repairs any drift.

pub mod button;
pub mod menu;
pub mod permission;
pub mod role;
pub mod user;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use button::ButtonUsecase;
pub use menu::MenuUsecase;
pub use permission::PermissionUsecase;
pub use role::RoleUsecase;
pub use user::{LoginAttempt, UserUsecase};

use crate::{
    error::{AppError, AppResult},
    models::{Id, unique_ids},
    policy::{PolicySynchronizer, Subject},
};

/// Self-service endpoints every authenticated user may call
pub const BASE_ROLE_POLICIES: &[(&str, &str)] = &[
    ("/api/v1/me/menu/tree", "GET"),
    ("/api/v1/me/password", "PATCH"),
    ("/api/v1/me/login-records", "GET"),
];

/// Fail with `NotFound` unless every requested id was found
pub(crate) fn ensure_resolved<T>(
    kind: &str,
    requested: &[Id],
    found: &[T],
    id_of: impl Fn(&T) -> Id,
) -> AppResult<()> {
    let missing: Vec<Id> = unique_ids(requested)
        .into_iter()
        .filter(|id| !found.iter().any(|item| id_of(item) == *id))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("{kind} {missing:?}")))
    }
}

/// Counts of entities whose policies were loaded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReloadSummary {
    pub permissions: usize,
    pub menus: usize,
    pub buttons: usize,
    pub roles: usize,
}

/// Rebuilds the policy graph from the database
#[derive(Clone)]
pub struct PolicyReloader {
    policy: PolicySynchronizer,
    permissions: PermissionUsecase,
    menus: MenuUsecase,
    buttons: ButtonUsecase,
    roles: RoleUsecase,
}

impl PolicyReloader {
    pub fn new(
        policy: PolicySynchronizer,
        permissions: PermissionUsecase,
        menus: MenuUsecase,
        buttons: ButtonUsecase,
        roles: RoleUsecase,
    ) -> Self {
        Self {
            policy,
            permissions,
            menus,
            buttons,
            roles,
        }
    }

    /// Add the base role policies and every entity's edges
    ///
    /// Adds are idempotent, so this is safe on a populated enforcer.
    pub async fn reload_all(&self, cancel: &CancellationToken) -> AppResult<ReloadSummary> {
        for (url, method) in BASE_ROLE_POLICIES {
            self.policy
                .grant(cancel, Subject::BASE_ROLE, url, method)
                .await?;
        }

        let summary = ReloadSummary {
            permissions: self.permissions.load_policy(cancel).await?,
            menus: self.menus.load_policy(cancel).await?,
            buttons: self.buttons.load_policy(cancel).await?,
            roles: self.roles.load_policy(cancel).await?,
        };

        info!(
            permissions = summary.permissions,
            menus = summary.menus,
            buttons = summary.buttons,
            roles = summary.roles,
            "Policies reloaded"
        );
        Ok(summary)
    }
}
