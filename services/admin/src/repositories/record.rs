//! Login record repository

use async_trait::async_trait;
use common::error::DatabaseResult;
use sqlx::PgPool;

use super::{LoginRecordRepository, count};
use crate::models::{LoginRecord, NewLoginRecord, Page, PageQuery};

const COLUMNS: &str = "id, username, ip_address, user_agent, status, login_at";

#[derive(Clone)]
pub struct PgLoginRecordRepository {
    pool: PgPool,
}

impl PgLoginRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoginRecordRepository for PgLoginRecordRepository {
    async fn create(&self, new: &NewLoginRecord) -> DatabaseResult<LoginRecord> {
        let record = sqlx::query_as::<_, LoginRecord>(&format!(
            r#"
            INSERT INTO login_records (username, ip_address, user_agent, status)
            VALUES ($1, $2, $3, $4)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&new.username)
        .bind(&new.ip_address)
        .bind(&new.user_agent)
        .bind(new.status)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list(&self, page: PageQuery) -> DatabaseResult<Page<LoginRecord>> {
        let total = count(&self.pool, "login_records").await?;
        let items = sqlx::query_as::<_, LoginRecord>(&format!(
            "SELECT {COLUMNS} FROM login_records ORDER BY login_at DESC, id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(Page { total, items })
    }

    async fn list_by_username(
        &self,
        username: &str,
        page: PageQuery,
    ) -> DatabaseResult<Page<LoginRecord>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM login_records WHERE username = $1")
                .bind(username)
                .fetch_one(&self.pool)
                .await?;
        let items = sqlx::query_as::<_, LoginRecord>(&format!(
            r#"
            SELECT {COLUMNS} FROM login_records
            WHERE username = $1
            ORDER BY login_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(username)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(Page { total, items })
    }
}
