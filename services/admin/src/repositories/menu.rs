//! Menu repository

use std::collections::HashMap;

use async_trait::async_trait;
use common::error::DatabaseResult;
use sqlx::{PgExecutor, PgPool, Row, postgres::PgRow, types::Json};
use tracing::info;

use super::{MenuRepository, count, permissions_by_owner, replace_links};
use crate::models::{Id, Menu, MenuMeta, NewMenu, Page, PageQuery, UpdateMenu, unique_ids};

const COLUMNS: &str =
    "id, path, component, name, meta, arrange_order, is_active, descr, parent_id, created_at, updated_at";

fn menu_from_row(row: &PgRow) -> Result<Menu, sqlx::Error> {
    let meta: Json<MenuMeta> = row.try_get("meta")?;
    Ok(Menu {
        id: row.try_get("id")?,
        path: row.try_get("path")?,
        component: row.try_get("component")?,
        name: row.try_get("name")?,
        meta: meta.0,
        arrange_order: row.try_get("arrange_order")?,
        is_active: row.try_get("is_active")?,
        descr: row.try_get("descr")?,
        parent_id: row.try_get("parent_id")?,
        permissions: Vec::new(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Attach permissions to freshly read menu rows
async fn with_permissions<'e, E>(executor: E, rows: Vec<PgRow>) -> DatabaseResult<Vec<Menu>>
where
    E: PgExecutor<'e>,
{
    let mut menus = rows
        .iter()
        .map(menu_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    let ids: Vec<Id> = menus.iter().map(|m| m.id).collect();
    let mut permissions = permissions_by_owner(executor, "menu_permissions", "menu_id", &ids).await?;
    for menu in &mut menus {
        menu.permissions = permissions.remove(&menu.id).unwrap_or_default();
    }
    Ok(menus)
}

/// Load menus by id with their permissions, keyed by id
pub(crate) async fn load_menus(pool: &PgPool, ids: &[Id]) -> DatabaseResult<HashMap<Id, Menu>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query(&format!("SELECT {COLUMNS} FROM menus WHERE id = ANY($1)"))
        .bind(ids.to_vec())
        .fetch_all(pool)
        .await?;
    let menus = with_permissions(pool, rows).await?;
    Ok(menus.into_iter().map(|m| (m.id, m)).collect())
}

#[derive(Clone)]
pub struct PgMenuRepository {
    pool: PgPool,
}

impl PgMenuRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MenuRepository for PgMenuRepository {
    async fn create(&self, new: &NewMenu) -> DatabaseResult<Menu> {
        let mut tx = self.pool.begin().await?;

        let id: Id = sqlx::query_scalar(
            r#"
            INSERT INTO menus (path, component, name, meta, arrange_order, is_active, descr, parent_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&new.path)
        .bind(&new.component)
        .bind(&new.name)
        .bind(Json(&new.meta))
        .bind(new.arrange_order)
        .bind(new.is_active)
        .bind(&new.descr)
        .bind(new.parent_id)
        .fetch_one(&mut *tx)
        .await?;

        replace_links(
            &mut tx,
            "menu_permissions",
            "menu_id",
            "permission_id",
            id,
            &unique_ids(&new.permission_ids),
        )
        .await?;
        tx.commit().await?;

        info!(menu_id = id, "Menu row created");
        self.find(id).await?.ok_or_else(|| sqlx::Error::RowNotFound.into())
    }

    async fn update(&self, id: Id, patch: &UpdateMenu) -> DatabaseResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE menus
            SET path = COALESCE($2, path),
                component = COALESCE($3, component),
                name = COALESCE($4, name),
                meta = COALESCE($5, meta),
                arrange_order = COALESCE($6, arrange_order),
                is_active = COALESCE($7, is_active),
                descr = COALESCE($8, descr),
                parent_id = CASE WHEN $9 THEN $10 ELSE parent_id END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&patch.path)
        .bind(&patch.component)
        .bind(&patch.name)
        .bind(patch.meta.as_ref().map(Json))
        .bind(patch.arrange_order)
        .bind(patch.is_active)
        .bind(&patch.descr)
        .bind(patch.parent_id.is_some())
        .bind(patch.parent_id.flatten())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if let Some(permission_ids) = &patch.permission_ids {
            replace_links(
                &mut tx,
                "menu_permissions",
                "menu_id",
                "permission_id",
                id,
                &unique_ids(permission_ids),
            )
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn delete(&self, id: Id) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM menus WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, id: Id) -> DatabaseResult<Option<Menu>> {
        Ok(load_menus(&self.pool, &[id]).await?.remove(&id))
    }

    async fn find_many(&self, ids: &[Id]) -> DatabaseResult<Vec<Menu>> {
        let mut menus: Vec<Menu> = load_menus(&self.pool, ids).await?.into_values().collect();
        menus.sort_by_key(|m| m.id);
        Ok(menus)
    }

    async fn list(&self, page: PageQuery) -> DatabaseResult<Page<Menu>> {
        let total = count(&self.pool, "menus").await?;
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM menus ORDER BY arrange_order, id LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        let items = with_permissions(&self.pool, rows).await?;
        Ok(Page { total, items })
    }
}
