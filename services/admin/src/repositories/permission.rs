//! Permission repository

use async_trait::async_trait;
use common::error::DatabaseResult;
use sqlx::PgPool;
use tracing::info;

use super::{PermissionRepository, count};
use crate::models::{Id, NewPermission, Page, PageQuery, Permission, UpdatePermission};

const COLUMNS: &str = "id, url, method, label, descr, created_at, updated_at";

#[derive(Clone)]
pub struct PgPermissionRepository {
    pool: PgPool,
}

impl PgPermissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionRepository for PgPermissionRepository {
    async fn create(&self, new: &NewPermission) -> DatabaseResult<Permission> {
        let permission = sqlx::query_as::<_, Permission>(&format!(
            r#"
            INSERT INTO permissions (url, method, label, descr)
            VALUES ($1, $2, $3, $4)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&new.url)
        .bind(&new.method)
        .bind(&new.label)
        .bind(&new.descr)
        .fetch_one(&self.pool)
        .await?;

        info!(permission_id = permission.id, "Permission row created");
        Ok(permission)
    }

    async fn update(&self, id: Id, patch: &UpdatePermission) -> DatabaseResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE permissions
            SET url = COALESCE($2, url),
                method = COALESCE($3, method),
                label = COALESCE($4, label),
                descr = COALESCE($5, descr),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&patch.url)
        .bind(&patch.method)
        .bind(&patch.label)
        .bind(&patch.descr)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Id) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, id: Id) -> DatabaseResult<Option<Permission>> {
        let permission = sqlx::query_as::<_, Permission>(&format!(
            "SELECT {COLUMNS} FROM permissions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(permission)
    }

    async fn find_many(&self, ids: &[Id]) -> DatabaseResult<Vec<Permission>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let permissions = sqlx::query_as::<_, Permission>(&format!(
            "SELECT {COLUMNS} FROM permissions WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;
        Ok(permissions)
    }

    async fn list(&self, page: PageQuery) -> DatabaseResult<Page<Permission>> {
        let total = count(&self.pool, "permissions").await?;
        let items = sqlx::query_as::<_, Permission>(&format!(
            "SELECT {COLUMNS} FROM permissions ORDER BY id LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(Page { total, items })
    }
}
