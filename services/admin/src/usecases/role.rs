//! Role use case

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{PermissionUsecase, ensure_resolved};
use crate::{
    error::{AppError, AppResult},
    menu_tree::{MenuTreeNode, build_menu_tree},
    models::{Id, NewRole, Page, PageQuery, Role, UpdateRole, unique_ids},
    policy::PolicySynchronizer,
    repositories::{ButtonRepository, MenuRepository, RoleRepository},
};

#[derive(Clone)]
pub struct RoleUsecase {
    repo: Arc<dyn RoleRepository>,
    menus: Arc<dyn MenuRepository>,
    buttons: Arc<dyn ButtonRepository>,
    permissions: PermissionUsecase,
    policy: PolicySynchronizer,
}

impl RoleUsecase {
    pub fn new(
        repo: Arc<dyn RoleRepository>,
        menus: Arc<dyn MenuRepository>,
        buttons: Arc<dyn ButtonRepository>,
        permissions: PermissionUsecase,
        policy: PolicySynchronizer,
    ) -> Self {
        Self {
            repo,
            menus,
            buttons,
            permissions,
            policy,
        }
    }

    async fn resolve_menus(&self, ids: &[Id]) -> AppResult<()> {
        let found = self.menus.find_many(&unique_ids(ids)).await?;
        ensure_resolved("menu", ids, &found, |m| m.id)
    }

    async fn resolve_buttons(&self, ids: &[Id]) -> AppResult<()> {
        let found = self.buttons.find_many(&unique_ids(ids)).await?;
        ensure_resolved("button", ids, &found, |b| b.id)
    }

    pub async fn create(&self, cancel: &CancellationToken, new: NewRole) -> AppResult<Role> {
        if new.name.trim().is_empty() {
            return Err(AppError::validation("role name is required"));
        }
        self.permissions.resolve(&new.permission_ids).await?;
        self.resolve_menus(&new.menu_ids).await?;
        self.resolve_buttons(&new.button_ids).await?;

        let role = self.repo.create(&new).await?;
        self.policy.add_group_policy(cancel, &role).await?;

        info!(role_id = role.id, "Role created");
        Ok(role)
    }

    pub async fn update(
        &self,
        cancel: &CancellationToken,
        id: Id,
        patch: UpdateRole,
    ) -> AppResult<Role> {
        if patch.name.as_ref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AppError::validation("role name must not be empty"));
        }
        self.find(id).await?;
        if let Some(ids) = &patch.permission_ids {
            self.permissions.resolve(ids).await?;
        }
        if let Some(ids) = &patch.menu_ids {
            self.resolve_menus(ids).await?;
        }
        if let Some(ids) = &patch.button_ids {
            self.resolve_buttons(ids).await?;
        }

        if !self.repo.update(id, &patch).await? {
            return Err(AppError::not_found(format!("role {id}")));
        }
        let role = self.find(id).await?;

        self.policy.remove_group_policy(cancel, &role, false).await?;
        self.policy.add_group_policy(cancel, &role).await?;

        info!(role_id = id, "Role updated");
        Ok(role)
    }

    pub async fn delete(&self, cancel: &CancellationToken, id: Id) -> AppResult<()> {
        let role = self.find(id).await?;
        if !self.repo.delete(id).await? {
            return Err(AppError::not_found(format!("role {id}")));
        }
        self.policy.remove_group_policy(cancel, &role, true).await?;

        info!(role_id = id, "Role deleted");
        Ok(())
    }

    pub async fn find(&self, id: Id) -> AppResult<Role> {
        self.repo
            .find(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("role {id}")))
    }

    pub async fn list(&self, page: PageQuery) -> AppResult<Page<Role>> {
        Ok(self.repo.list(page).await?)
    }

    /// Navigation tree of the menus and buttons granted directly to the role
    pub async fn menu_tree(&self, role_id: Id) -> AppResult<Vec<MenuTreeNode>> {
        let role = self.find(role_id).await?;
        Ok(build_menu_tree(role.menus, role.buttons)?)
    }

    pub async fn load_policy(&self, cancel: &CancellationToken) -> AppResult<usize> {
        let page = self.repo.list(PageQuery::all()).await?;
        for role in &page.items {
            self.policy.add_group_policy(cancel, role).await?;
        }
        Ok(page.items.len())
    }
}
