//! Catalog store clients.
//!
//! The catalog holds one `CatalogRecord` per id. `SqliteCatalogStore` is the
//! durable backend; `MemoryCatalogStore` is an in-process map for development
//! and tests.

use crate::models::record::CatalogRecord;
use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

const INIT_SQL: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Debug, Error)]
pub enum CatalogStoreError {
    #[error("catalog store unavailable: {0}")]
    Unavailable(String),
    #[error("catalog record {0} conflicts with an existing entry")]
    Conflict(i64),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type CatalogResult<T> = Result<T, CatalogStoreError>;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert or overwrite the record keyed by `record.id`.
    async fn put(&self, record: &CatalogRecord) -> CatalogResult<()>;

    /// Every stored record, in whatever order the store yields them.
    async fn scan(&self) -> CatalogResult<Vec<CatalogRecord>>;

    /// Remove the record with `id`. Missing ids are not an error.
    async fn delete(&self, id: i64) -> CatalogResult<()>;

    async fn health_check(&self) -> CatalogResult<()>;
}

/// SQLite-backed catalog.
#[derive(Clone)]
pub struct SqliteCatalogStore {
    db: Arc<SqlitePool>,
}

impl SqliteCatalogStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Create the catalog table if it does not exist yet.
    pub async fn migrate(&self) -> CatalogResult<()> {
        let statements = INIT_SQL
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty());

        for stmt in statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }
}

/// Map connection-level failures to `Unavailable`, unique violations to
/// `Conflict`, and keep everything else as the raw driver error.
fn classify(err: sqlx::Error, id: i64) -> CatalogStoreError {
    match err {
        sqlx::Error::Database(ref db_err)
            if db_err.message().to_ascii_lowercase().contains("unique") =>
        {
            CatalogStoreError::Conflict(id)
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            CatalogStoreError::Unavailable(err.to_string())
        }
        other => CatalogStoreError::Sqlx(other),
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn put(&self, record: &CatalogRecord) -> CatalogResult<()> {
        sqlx::query(
            r#"
            INSERT INTO catalog_records (id, name, quantity, image_reference)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                quantity = excluded.quantity,
                image_reference = excluded.image_reference
            "#,
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(record.quantity)
        .bind(&record.image_reference)
        .execute(&*self.db)
        .await
        .map_err(|err| classify(err, record.id))?;
        Ok(())
    }

    async fn scan(&self) -> CatalogResult<Vec<CatalogRecord>> {
        sqlx::query_as::<_, CatalogRecord>(
            "SELECT id, name, quantity, image_reference FROM catalog_records",
        )
        .fetch_all(&*self.db)
        .await
        .map_err(|err| classify(err, 0))
    }

    async fn delete(&self, id: i64) -> CatalogResult<()> {
        let result = sqlx::query("DELETE FROM catalog_records WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await
            .map_err(|err| classify(err, id))?;

        if result.rows_affected() == 0 {
            debug!(id, "catalog record already absent");
        }
        Ok(())
    }

    async fn health_check(&self) -> CatalogResult<()> {
        let one = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await
            .map_err(|err| classify(err, 0))?;
        if one != 1 {
            return Err(CatalogStoreError::Unavailable(format!(
                "unexpected result: {one}"
            )));
        }
        Ok(())
    }
}

/// In-process catalog.
#[derive(Default)]
pub struct MemoryCatalogStore {
    records: DashMap<i64, CatalogRecord>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn put(&self, record: &CatalogRecord) -> CatalogResult<()> {
        self.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn scan(&self) -> CatalogResult<Vec<CatalogRecord>> {
        Ok(self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn delete(&self, id: i64) -> CatalogResult<()> {
        self.records.remove(&id);
        Ok(())
    }

    async fn health_check(&self) -> CatalogResult<()> {
        Ok(())
    }
}
