//! Button repository

use std::collections::HashMap;

use async_trait::async_trait;
use common::error::DatabaseResult;
use sqlx::{PgExecutor, PgPool, Row, postgres::PgRow};
use tracing::info;

use super::{ButtonRepository, count, permissions_by_owner, replace_links};
use crate::models::{Button, Id, NewButton, Page, PageQuery, UpdateButton, unique_ids};

const COLUMNS: &str = "id, name, arrange_order, is_active, descr, menu_id, created_at, updated_at";

fn button_from_row(row: &PgRow) -> Result<Button, sqlx::Error> {
    Ok(Button {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        arrange_order: row.try_get("arrange_order")?,
        is_active: row.try_get("is_active")?,
        descr: row.try_get("descr")?,
        menu_id: row.try_get("menu_id")?,
        permissions: Vec::new(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

async fn with_permissions<'e, E>(executor: E, rows: Vec<PgRow>) -> DatabaseResult<Vec<Button>>
where
    E: PgExecutor<'e>,
{
    let mut buttons = rows
        .iter()
        .map(button_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    let ids: Vec<Id> = buttons.iter().map(|b| b.id).collect();
    let mut permissions =
        permissions_by_owner(executor, "button_permissions", "button_id", &ids).await?;
    for button in &mut buttons {
        button.permissions = permissions.remove(&button.id).unwrap_or_default();
    }
    Ok(buttons)
}

/// Load buttons by id with their permissions, keyed by id
pub(crate) async fn load_buttons(
    pool: &PgPool,
    ids: &[Id],
) -> DatabaseResult<HashMap<Id, Button>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query(&format!("SELECT {COLUMNS} FROM buttons WHERE id = ANY($1)"))
        .bind(ids.to_vec())
        .fetch_all(pool)
        .await?;
    let buttons = with_permissions(pool, rows).await?;
    Ok(buttons.into_iter().map(|b| (b.id, b)).collect())
}

#[derive(Clone)]
pub struct PgButtonRepository {
    pool: PgPool,
}

impl PgButtonRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ButtonRepository for PgButtonRepository {
    async fn create(&self, new: &NewButton) -> DatabaseResult<Button> {
        let mut tx = self.pool.begin().await?;

        let id: Id = sqlx::query_scalar(
            r#"
            INSERT INTO buttons (name, arrange_order, is_active, descr, menu_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&new.name)
        .bind(new.arrange_order)
        .bind(new.is_active)
        .bind(&new.descr)
        .bind(new.menu_id)
        .fetch_one(&mut *tx)
        .await?;

        replace_links(
            &mut tx,
            "button_permissions",
            "button_id",
            "permission_id",
            id,
            &unique_ids(&new.permission_ids),
        )
        .await?;
        tx.commit().await?;

        info!(button_id = id, menu_id = new.menu_id, "Button row created");
        self.find(id).await?.ok_or_else(|| sqlx::Error::RowNotFound.into())
    }

    async fn update(&self, id: Id, patch: &UpdateButton) -> DatabaseResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE buttons
            SET name = COALESCE($2, name),
                menu_id = COALESCE($3, menu_id),
                arrange_order = COALESCE($4, arrange_order),
                is_active = COALESCE($5, is_active),
                descr = COALESCE($6, descr),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(patch.menu_id)
        .bind(patch.arrange_order)
        .bind(patch.is_active)
        .bind(&patch.descr)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if let Some(permission_ids) = &patch.permission_ids {
            replace_links(
                &mut tx,
                "button_permissions",
                "button_id",
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
        let result = sqlx::query("DELETE FROM buttons WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, id: Id) -> DatabaseResult<Option<Button>> {
        Ok(load_buttons(&self.pool, &[id]).await?.remove(&id))
    }

    async fn find_many(&self, ids: &[Id]) -> DatabaseResult<Vec<Button>> {
        let mut buttons: Vec<Button> = load_buttons(&self.pool, ids).await?.into_values().collect();
        buttons.sort_by_key(|b| b.id);
        Ok(buttons)
    }

    async fn list(&self, page: PageQuery) -> DatabaseResult<Page<Button>> {
        let total = count(&self.pool, "buttons").await?;
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM buttons ORDER BY menu_id, arrange_order, id LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        let items = with_permissions(&self.pool, rows).await?;
        Ok(Page { total, items })
    }
}
