//! Role repository

use async_trait::async_trait;
use common::error::DatabaseResult;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;

use super::{
    RoleRepository, button::load_buttons, count, links_by_owner, menu::load_menus,
    permissions_by_owner, replace_links,
};
use crate::models::{Id, NewRole, Page, PageQuery, Role, UpdateRole, unique_ids};

const COLUMNS: &str = "id, name, descr, created_at, updated_at";

fn role_from_row(row: &PgRow) -> Result<Role, sqlx::Error> {
    Ok(Role {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        descr: row.try_get("descr")?,
        permissions: Vec::new(),
        menus: Vec::new(),
        buttons: Vec::new(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[derive(Clone)]
pub struct PgRoleRepository {
    pool: PgPool,
}

impl PgRoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Populate the three direct-grant lists of each role
    async fn with_associations(&self, rows: Vec<PgRow>) -> DatabaseResult<Vec<Role>> {
        let mut roles = rows
            .iter()
            .map(role_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        let ids: Vec<Id> = roles.iter().map(|r| r.id).collect();

        let mut permissions =
            permissions_by_owner(&self.pool, "role_permissions", "role_id", &ids).await?;
        let mut menu_links =
            links_by_owner(&self.pool, "role_menus", "role_id", "menu_id", &ids).await?;
        let mut button_links =
            links_by_owner(&self.pool, "role_buttons", "role_id", "button_id", &ids).await?;

        let menu_ids = unique_ids(&menu_links.values().flatten().copied().collect::<Vec<_>>());
        let button_ids =
            unique_ids(&button_links.values().flatten().copied().collect::<Vec<_>>());
        let menus = load_menus(&self.pool, &menu_ids).await?;
        let buttons = load_buttons(&self.pool, &button_ids).await?;

        for role in &mut roles {
            role.permissions = permissions.remove(&role.id).unwrap_or_default();
            role.menus = menu_links
                .remove(&role.id)
                .unwrap_or_default()
                .iter()
                .filter_map(|id| menus.get(id).cloned())
                .collect();
            role.buttons = button_links
                .remove(&role.id)
                .unwrap_or_default()
                .iter()
                .filter_map(|id| buttons.get(id).cloned())
                .collect();
        }
        Ok(roles)
    }
}

#[async_trait]
impl RoleRepository for PgRoleRepository {
    async fn create(&self, new: &NewRole) -> DatabaseResult<Role> {
        let mut tx = self.pool.begin().await?;

        let id: Id = sqlx::query_scalar(
            "INSERT INTO roles (name, descr) VALUES ($1, $2) RETURNING id",
        )
        .bind(&new.name)
        .bind(&new.descr)
        .fetch_one(&mut *tx)
        .await?;

        replace_links(
            &mut tx,
            "role_permissions",
            "role_id",
            "permission_id",
            id,
            &unique_ids(&new.permission_ids),
        )
        .await?;
        replace_links(
            &mut tx,
            "role_menus",
            "role_id",
            "menu_id",
            id,
            &unique_ids(&new.menu_ids),
        )
        .await?;
        replace_links(
            &mut tx,
            "role_buttons",
            "role_id",
            "button_id",
            id,
            &unique_ids(&new.button_ids),
        )
        .await?;
        tx.commit().await?;

        info!(role_id = id, "Role row created");
        self.find(id).await?.ok_or_else(|| sqlx::Error::RowNotFound.into())
    }

    async fn update(&self, id: Id, patch: &UpdateRole) -> DatabaseResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE roles
            SET name = COALESCE($2, name),
                descr = COALESCE($3, descr),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.descr)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if let Some(ids) = &patch.permission_ids {
            replace_links(
                &mut tx,
                "role_permissions",
                "role_id",
                "permission_id",
                id,
                &unique_ids(ids),
            )
            .await?;
        }
        if let Some(ids) = &patch.menu_ids {
            replace_links(
                &mut tx,
                "role_menus",
                "role_id",
                "menu_id",
                id,
                &unique_ids(ids),
            )
            .await?;
        }
        if let Some(ids) = &patch.button_ids {
            replace_links(
                &mut tx,
                "role_buttons",
                "role_id",
                "button_id",
                id,
                &unique_ids(ids),
            )
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn delete(&self, id: Id) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, id: Id) -> DatabaseResult<Option<Role>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM roles WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(self.with_associations(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list(&self, page: PageQuery) -> DatabaseResult<Page<Role>> {
        let total = count(&self.pool, "roles").await?;
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM roles ORDER BY id LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        let items = self.with_associations(rows).await?;
        Ok(Page { total, items })
    }
}
