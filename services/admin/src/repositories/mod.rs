//! Repositories for database operations
//!
//! One trait per entity; the `Pg*` implementations load every association
//! together with the row so callers always see fully populated models.

use std::collections::HashMap;

use async_trait::async_trait;
use common::error::DatabaseResult;
use sqlx::{FromRow, PgExecutor, Postgres, Row, Transaction};

use crate::models::{
    Button, Id, LoginRecord, Menu, NewButton, NewLoginRecord, NewMenu, NewPermission, NewRole,
    NewUserRecord, Page, PageQuery, Permission, Role, UpdateButton, UpdateMenu, UpdatePermission,
    UpdateRole, User, UserChanges,
};

pub mod button;
pub mod menu;
pub mod permission;
pub mod record;
pub mod role;
pub mod user;

pub use button::PgButtonRepository;
pub use menu::PgMenuRepository;
pub use permission::PgPermissionRepository;
pub use record::PgLoginRecordRepository;
pub use role::PgRoleRepository;
pub use user::PgUserRepository;

#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn create(&self, new: &NewPermission) -> DatabaseResult<Permission>;
    /// `false` when no row has `id`
    async fn update(&self, id: Id, patch: &UpdatePermission) -> DatabaseResult<bool>;
    async fn delete(&self, id: Id) -> DatabaseResult<bool>;
    async fn find(&self, id: Id) -> DatabaseResult<Option<Permission>>;
    /// Rows among `ids` that exist, ordered by id
    async fn find_many(&self, ids: &[Id]) -> DatabaseResult<Vec<Permission>>;
    async fn list(&self, page: PageQuery) -> DatabaseResult<Page<Permission>>;
}

#[async_trait]
pub trait MenuRepository: Send + Sync {
    async fn create(&self, new: &NewMenu) -> DatabaseResult<Menu>;
    async fn update(&self, id: Id, patch: &UpdateMenu) -> DatabaseResult<bool>;
    async fn delete(&self, id: Id) -> DatabaseResult<bool>;
    async fn find(&self, id: Id) -> DatabaseResult<Option<Menu>>;
    async fn find_many(&self, ids: &[Id]) -> DatabaseResult<Vec<Menu>>;
    async fn list(&self, page: PageQuery) -> DatabaseResult<Page<Menu>>;
}

#[async_trait]
pub trait ButtonRepository: Send + Sync {
    async fn create(&self, new: &NewButton) -> DatabaseResult<Button>;
    async fn update(&self, id: Id, patch: &UpdateButton) -> DatabaseResult<bool>;
    async fn delete(&self, id: Id) -> DatabaseResult<bool>;
    async fn find(&self, id: Id) -> DatabaseResult<Option<Button>>;
    async fn find_many(&self, ids: &[Id]) -> DatabaseResult<Vec<Button>>;
    async fn list(&self, page: PageQuery) -> DatabaseResult<Page<Button>>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn create(&self, new: &NewRole) -> DatabaseResult<Role>;
    async fn update(&self, id: Id, patch: &UpdateRole) -> DatabaseResult<bool>;
    async fn delete(&self, id: Id) -> DatabaseResult<bool>;
    async fn find(&self, id: Id) -> DatabaseResult<Option<Role>>;
    async fn list(&self, page: PageQuery) -> DatabaseResult<Page<Role>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, new: &NewUserRecord) -> DatabaseResult<User>;
    async fn update(&self, id: Id, changes: &UserChanges) -> DatabaseResult<bool>;
    async fn delete(&self, id: Id) -> DatabaseResult<bool>;
    async fn find(&self, id: Id) -> DatabaseResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<User>>;
    async fn list(&self, page: PageQuery) -> DatabaseResult<Page<User>>;
}

#[async_trait]
pub trait LoginRecordRepository: Send + Sync {
    async fn create(&self, new: &NewLoginRecord) -> DatabaseResult<LoginRecord>;
    async fn list(&self, page: PageQuery) -> DatabaseResult<Page<LoginRecord>>;
    async fn list_by_username(
        &self,
        username: &str,
        page: PageQuery,
    ) -> DatabaseResult<Page<LoginRecord>>;
}

/// Permissions linked to each owner through `table(owner_column, permission_id)`
pub(crate) async fn permissions_by_owner<'e, E>(
    executor: E,
    table: &str,
    owner_column: &str,
    owner_ids: &[Id],
) -> DatabaseResult<HashMap<Id, Vec<Permission>>>
where
    E: PgExecutor<'e>,
{
    if owner_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let sql = format!(
        r#"
        SELECT l.{owner_column} AS owner_id, p.id, p.url, p.method, p.label, p.descr,
               p.created_at, p.updated_at
        FROM {table} l
        JOIN permissions p ON p.id = l.permission_id
        WHERE l.{owner_column} = ANY($1)
        ORDER BY p.id
        "#
    );
    let rows = sqlx::query(&sql)
        .bind(owner_ids.to_vec())
        .fetch_all(executor)
        .await?;

    let mut grouped: HashMap<Id, Vec<Permission>> = HashMap::new();
    for row in rows {
        let owner: Id = row.try_get("owner_id")?;
        grouped
            .entry(owner)
            .or_default()
            .push(Permission::from_row(&row)?);
    }
    Ok(grouped)
}

/// Target ids linked to each owner through `table(owner_column, target_column)`
pub(crate) async fn links_by_owner<'e, E>(
    executor: E,
    table: &str,
    owner_column: &str,
    target_column: &str,
    owner_ids: &[Id],
) -> DatabaseResult<HashMap<Id, Vec<Id>>>
where
    E: PgExecutor<'e>,
{
    if owner_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let sql = format!(
        "SELECT {owner_column} AS owner_id, {target_column} AS target_id \
         FROM {table} WHERE {owner_column} = ANY($1) ORDER BY {target_column}"
    );
    let rows = sqlx::query(&sql)
        .bind(owner_ids.to_vec())
        .fetch_all(executor)
        .await?;

    let mut grouped: HashMap<Id, Vec<Id>> = HashMap::new();
    for row in rows {
        grouped
            .entry(row.try_get("owner_id")?)
            .or_default()
            .push(row.try_get("target_id")?);
    }
    Ok(grouped)
}

/// Replace every link of `owner_id` in a join table
pub(crate) async fn replace_links(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    owner_column: &str,
    target_column: &str,
    owner_id: Id,
    target_ids: &[Id],
) -> DatabaseResult<()> {
    sqlx::query(&format!("DELETE FROM {table} WHERE {owner_column} = $1"))
        .bind(owner_id)
        .execute(&mut **tx)
        .await?;

    if !target_ids.is_empty() {
        sqlx::query(&format!(
            "INSERT INTO {table} ({owner_column}, {target_column}) \
             SELECT $1, UNNEST($2::BIGINT[]) ON CONFLICT DO NOTHING"
        ))
        .bind(owner_id)
        .bind(target_ids.to_vec())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Total row count of a table
pub(crate) async fn count<'e, E>(executor: E, table: &str) -> DatabaseResult<i64>
where
    E: PgExecutor<'e>,
{
    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(executor)
        .await?;
    Ok(total)
}
