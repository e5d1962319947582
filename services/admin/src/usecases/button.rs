//! Button use case

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::PermissionUsecase;
use crate::{
    error::{AppError, AppResult},
    models::{Button, Id, NewButton, Page, PageQuery, UpdateButton},
    policy::PolicySynchronizer,
    repositories::{ButtonRepository, MenuRepository},
};

#[derive(Clone)]
pub struct ButtonUsecase {
    repo: Arc<dyn ButtonRepository>,
    menus: Arc<dyn MenuRepository>,
    permissions: PermissionUsecase,
    policy: PolicySynchronizer,
}

impl ButtonUsecase {
    pub fn new(
        repo: Arc<dyn ButtonRepository>,
        menus: Arc<dyn MenuRepository>,
        permissions: PermissionUsecase,
        policy: PolicySynchronizer,
    ) -> Self {
        Self {
            repo,
            menus,
            permissions,
            policy,
        }
    }

    async fn ensure_menu(&self, menu_id: Id) -> AppResult<()> {
        if menu_id == 0 {
            return Err(AppError::validation("button menu is required"));
        }
        if self.menus.find(menu_id).await?.is_none() {
            return Err(AppError::not_found(format!("menu {menu_id}")));
        }
        Ok(())
    }

    pub async fn create(&self, cancel: &CancellationToken, new: NewButton) -> AppResult<Button> {
        if new.name.trim().is_empty() {
            return Err(AppError::validation("button name is required"));
        }
        self.ensure_menu(new.menu_id).await?;
        self.permissions.resolve(&new.permission_ids).await?;

        let button = self.repo.create(&new).await?;
        self.policy.add_group_policy(cancel, &button).await?;

        info!(button_id = button.id, menu_id = button.menu_id, "Button created");
        Ok(button)
    }

    pub async fn update(
        &self,
        cancel: &CancellationToken,
        id: Id,
        patch: UpdateButton,
    ) -> AppResult<Button> {
        self.find(id).await?;
        if let Some(menu_id) = patch.menu_id {
            self.ensure_menu(menu_id).await?;
        }
        if let Some(permission_ids) = &patch.permission_ids {
            self.permissions.resolve(permission_ids).await?;
        }

        if !self.repo.update(id, &patch).await? {
            return Err(AppError::not_found(format!("button {id}")));
        }
        let button = self.find(id).await?;

        self.policy.remove_group_policy(cancel, &button, false).await?;
        self.policy.add_group_policy(cancel, &button).await?;

        info!(button_id = id, "Button updated");
        Ok(button)
    }

    pub async fn delete(&self, cancel: &CancellationToken, id: Id) -> AppResult<()> {
        let button = self.find(id).await?;
        if !self.repo.delete(id).await? {
            return Err(AppError::not_found(format!("button {id}")));
        }
        self.policy.remove_group_policy(cancel, &button, true).await?;

        info!(button_id = id, "Button deleted");
        Ok(())
    }

    pub async fn find(&self, id: Id) -> AppResult<Button> {
        self.repo
            .find(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("button {id}")))
    }

    pub async fn list(&self, page: PageQuery) -> AppResult<Page<Button>> {
        Ok(self.repo.list(page).await?)
    }

    pub async fn load_policy(&self, cancel: &CancellationToken) -> AppResult<usize> {
        let page = self.repo.list(PageQuery::all()).await?;
        for button in &page.items {
            self.policy.add_group_policy(cancel, button).await?;
        }
        Ok(page.items.len())
    }
}
