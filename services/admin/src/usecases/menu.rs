//! Menu use case

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::PermissionUsecase;
use crate::{
    error::{AppError, AppResult},
    models::{Id, Menu, NewMenu, Page, PageQuery, UpdateMenu},
    policy::PolicySynchronizer,
    repositories::MenuRepository,
};

#[derive(Clone)]
pub struct MenuUsecase {
    repo: Arc<dyn MenuRepository>,
    permissions: PermissionUsecase,
    policy: PolicySynchronizer,
}

impl MenuUsecase {
    pub fn new(
        repo: Arc<dyn MenuRepository>,
        permissions: PermissionUsecase,
        policy: PolicySynchronizer,
    ) -> Self {
        Self {
            repo,
            permissions,
            policy,
        }
    }

    async fn ensure_parent(&self, parent_id: Id) -> AppResult<()> {
        if self.repo.find(parent_id).await?.is_none() {
            return Err(AppError::not_found(format!("parent menu {parent_id}")));
        }
        Ok(())
    }

    /// Reject a parent whose ancestor chain reaches `menu_id`
    async fn ensure_not_ancestor(&self, menu_id: Id, parent_id: Id) -> AppResult<()> {
        let mut seen = HashSet::new();
        let mut cursor = Some(parent_id);
        while let Some(id) = cursor {
            if id == menu_id {
                return Err(AppError::validation(format!(
                    "menu {menu_id} cannot be its own ancestor"
                )));
            }
            if !seen.insert(id) {
                // Stored data already loops above us, but not through this menu
                break;
            }
            cursor = self.repo.find(id).await?.and_then(|m| m.parent_id);
        }
        Ok(())
    }

    pub async fn create(&self, cancel: &CancellationToken, new: NewMenu) -> AppResult<Menu> {
        if new.name.trim().is_empty() || !new.path.starts_with('/') {
            return Err(AppError::validation("menu name and an absolute path are required"));
        }
        if let Some(parent_id) = new.parent_id {
            self.ensure_parent(parent_id).await?;
        }
        self.permissions.resolve(&new.permission_ids).await?;

        let menu = self.repo.create(&new).await?;
        self.policy.add_group_policy(cancel, &menu).await?;

        info!(menu_id = menu.id, parent_id = ?menu.parent_id, "Menu created");
        Ok(menu)
    }

    pub async fn update(
        &self,
        cancel: &CancellationToken,
        id: Id,
        patch: UpdateMenu,
    ) -> AppResult<Menu> {
        if patch.path.as_ref().is_some_and(|p| !p.starts_with('/')) {
            return Err(AppError::validation("menu path must be absolute"));
        }
        self.find(id).await?;
        if let Some(Some(parent_id)) = patch.parent_id {
            self.ensure_parent(parent_id).await?;
            self.ensure_not_ancestor(id, parent_id).await?;
        }
        if let Some(permission_ids) = &patch.permission_ids {
            self.permissions.resolve(permission_ids).await?;
        }

        if !self.repo.update(id, &patch).await? {
            return Err(AppError::not_found(format!("menu {id}")));
        }
        let menu = self.find(id).await?;

        // Dependents keep their edges to this menu
        self.policy.remove_group_policy(cancel, &menu, false).await?;
        self.policy.add_group_policy(cancel, &menu).await?;

        info!(menu_id = id, "Menu updated");
        Ok(menu)
    }

    pub async fn delete(&self, cancel: &CancellationToken, id: Id) -> AppResult<()> {
        let menu = self.find(id).await?;
        if !self.repo.delete(id).await? {
            return Err(AppError::not_found(format!("menu {id}")));
        }
        self.policy.remove_group_policy(cancel, &menu, true).await?;

        info!(menu_id = id, "Menu deleted");
        Ok(())
    }

    pub async fn find(&self, id: Id) -> AppResult<Menu> {
        self.repo
            .find(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("menu {id}")))
    }

    pub async fn list(&self, page: PageQuery) -> AppResult<Page<Menu>> {
        Ok(self.repo.list(page).await?)
    }

    pub async fn load_policy(&self, cancel: &CancellationToken) -> AppResult<usize> {
        let page = self.repo.list(PageQuery::all()).await?;
        for menu in &page.items {
            self.policy.add_group_policy(cancel, menu).await?;
        }
        Ok(page.items.len())
    }
}
