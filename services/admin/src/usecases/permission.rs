//! Permission use case

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::ensure_resolved;
use crate::{
    error::{AppError, AppResult},
    models::{Id, NewPermission, Page, PageQuery, Permission, UpdatePermission, unique_ids},
    policy::PolicySynchronizer,
    repositories::PermissionRepository,
    validation::{validate_method, validate_url},
};

#[derive(Clone)]
pub struct PermissionUsecase {
    repo: Arc<dyn PermissionRepository>,
    policy: PolicySynchronizer,
}

impl PermissionUsecase {
    pub fn new(repo: Arc<dyn PermissionRepository>, policy: PolicySynchronizer) -> Self {
        Self { repo, policy }
    }

    pub async fn create(
        &self,
        cancel: &CancellationToken,
        mut new: NewPermission,
    ) -> AppResult<Permission> {
        validate_url(&new.url).map_err(AppError::Validation)?;
        new.method = validate_method(&new.method).map_err(AppError::Validation)?;

        let permission = self.repo.create(&new).await?;
        self.policy.add_policy(cancel, &permission).await?;

        info!(permission_id = permission.id, "Permission created");
        Ok(permission)
    }

    /// Update a permission, moving its policy tuple to the new url/method
    pub async fn update(
        &self,
        cancel: &CancellationToken,
        id: Id,
        mut patch: UpdatePermission,
    ) -> AppResult<Permission> {
        if let Some(url) = &patch.url {
            validate_url(url).map_err(AppError::Validation)?;
        }
        if let Some(method) = &patch.method {
            patch.method = Some(validate_method(method).map_err(AppError::Validation)?);
        }

        let previous = self.find(id).await?;
        if !self.repo.update(id, &patch).await? {
            return Err(AppError::not_found(format!("permission {id}")));
        }
        let current = self.find(id).await?;

        // The old tuple is keyed by the old url/method
        self.policy.remove_policy(cancel, &previous, false).await?;
        self.policy.add_policy(cancel, &current).await?;

        info!(permission_id = id, "Permission updated");
        Ok(current)
    }

    pub async fn delete(&self, cancel: &CancellationToken, id: Id) -> AppResult<()> {
        let permission = self.find(id).await?;
        if !self.repo.delete(id).await? {
            return Err(AppError::not_found(format!("permission {id}")));
        }
        self.policy.remove_policy(cancel, &permission, true).await?;

        info!(permission_id = id, "Permission deleted");
        Ok(())
    }

    pub async fn find(&self, id: Id) -> AppResult<Permission> {
        self.repo
            .find(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("permission {id}")))
    }

    /// Load every permission in `ids`, failing when any is missing
    pub async fn resolve(&self, ids: &[Id]) -> AppResult<Vec<Permission>> {
        let found = self.repo.find_many(&unique_ids(ids)).await?;
        ensure_resolved("permission", ids, &found, |p| p.id)?;
        Ok(found)
    }

    pub async fn list(&self, page: PageQuery) -> AppResult<Page<Permission>> {
        Ok(self.repo.list(page).await?)
    }

    /// Add the tuple of every stored permission
    pub async fn load_policy(&self, cancel: &CancellationToken) -> AppResult<usize> {
        let page = self.repo.list(PageQuery::all()).await?;
        for permission in &page.items {
            self.policy.add_policy(cancel, permission).await?;
        }
        Ok(page.items.len())
    }
}
