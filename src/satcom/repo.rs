use async_trait::async_trait;
use sqlx::PgPool;

use crate::{auth::repo::StoreError, satcom::dto::{Satcom, SatcomInput}};

#[async_trait]
pub trait SatcomStore: Send + Sync {
    async fn create(&self, input: SatcomInput) -> Result<Satcom, StoreError>;
    async fn get(&self, id: i32) -> Result<Option<Satcom>, StoreError>;
    async fn list(&self) -> Result<Vec<Satcom>, StoreError>;
    /// `None` when no record has this id.
    async fn update(&self, id: i32, input: SatcomInput) -> Result<Option<Satcom>, StoreError>;
    /// `false` when no record has this id.
    async fn delete(&self, id: i32) -> Result<bool, StoreError>;
}

const SATCOM_COLUMNS: &str =
    r#"id, company, category, "type", date, time, db_port, ui_port, url, ip, status"#;

pub struct PgSatcomStore {
    db: PgPool,
}

impl PgSatcomStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SatcomStore for PgSatcomStore {
    async fn create(&self, input: SatcomInput) -> Result<Satcom, StoreError> {
        let sql = format!(
            r#"INSERT INTO satcom (company, category, "type", date, time, db_port, ui_port, url, ip, status)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING {SATCOM_COLUMNS}"#
        );
        let row = sqlx::query_as::<_, Satcom>(&sql)
            .bind(&input.company)
            .bind(&input.category)
            .bind(&input.kind)
            .bind(&input.date)
            .bind(&input.time)
            .bind(&input.db_port)
            .bind(&input.ui_port)
            .bind(&input.url)
            .bind(&input.ip)
            .bind(input.status)
            .fetch_one(&self.db)
            .await?;
        Ok(row)
    }

    async fn get(&self, id: i32) -> Result<Option<Satcom>, StoreError> {
        let sql = format!("SELECT {SATCOM_COLUMNS} FROM satcom WHERE id = $1");
        let row = sqlx::query_as::<_, Satcom>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn list(&self) -> Result<Vec<Satcom>, StoreError> {
        let sql = format!("SELECT {SATCOM_COLUMNS} FROM satcom ORDER BY id");
        let rows = sqlx::query_as::<_, Satcom>(&sql)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn update(&self, id: i32, input: SatcomInput) -> Result<Option<Satcom>, StoreError> {
        let sql = format!(
            r#"UPDATE satcom
               SET company = $1, category = $2, "type" = $3, date = $4, time = $5,
                   db_port = $6, ui_port = $7, url = $8, ip = $9, status = $10
               WHERE id = $11
               RETURNING {SATCOM_COLUMNS}"#
        );
        let row = sqlx::query_as::<_, Satcom>(&sql)
            .bind(&input.company)
            .bind(&input.category)
            .bind(&input.kind)
            .bind(&input.date)
            .bind(&input.time)
            .bind(&input.db_port)
            .bind(&input.ui_port)
            .bind(&input.url)
            .bind(&input.ip)
            .bind(input.status)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn delete(&self, id: i32) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM satcom WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
