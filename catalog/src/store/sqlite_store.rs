//! SQLite-backed implementation of the `CatalogStore` trait. Ensures the
//! schema on startup and maps rows to `ResourceKind`.
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use reservation::model::KindId;

use super::CatalogStore;
use crate::model::ResourceKind;

pub struct SqliteCatalogStore {
    pool: SqlitePool,
}

impl SqliteCatalogStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePool::connect(url).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
        sqlx::query(
            r#"
CREATE TABLE IF NOT EXISTS resource_kinds (
  kind TEXT PRIMARY KEY,
  capacity_per_day INTEGER NOT NULL,
  is_slotted INTEGER NOT NULL CHECK (is_slotted IN (0,1)),
  is_active INTEGER NOT NULL CHECK (is_active IN (0,1))
);
"#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

fn row_to_kind(row: &sqlx::sqlite::SqliteRow) -> ResourceKind {
    ResourceKind {
        kind: KindId::new(row.get::<String, _>("kind")),
        capacity_per_day: row.get::<i64, _>("capacity_per_day") as u32,
        is_slotted: row.get::<bool, _>("is_slotted"),
        is_active: row.get::<bool, _>("is_active"),
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn upsert(&self, kind: &ResourceKind) -> anyhow::Result<()> {
        sqlx::query(
            r#"
INSERT INTO resource_kinds (kind, capacity_per_day, is_slotted, is_active)
VALUES (?, ?, ?, ?)
ON CONFLICT(kind) DO UPDATE SET
    capacity_per_day = excluded.capacity_per_day,
    is_slotted = excluded.is_slotted,
    is_active = excluded.is_active;
"#,
        )
        .bind(kind.kind.as_str())
        .bind(kind.capacity_per_day as i64)
        .bind(kind.is_slotted)
        .bind(kind.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, kind: &KindId) -> anyhow::Result<Option<ResourceKind>> {
        let row = sqlx::query("SELECT * FROM resource_kinds WHERE kind = ?")
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(row_to_kind))
    }

    async fn list_active(&self) -> anyhow::Result<Vec<ResourceKind>> {
        let rows = sqlx::query("SELECT * FROM resource_kinds WHERE is_active = 1 ORDER BY kind")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(row_to_kind).collect())
    }

    async fn list_all(&self) -> anyhow::Result<Vec<ResourceKind>> {
        let rows = sqlx::query("SELECT * FROM resource_kinds ORDER BY kind")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(row_to_kind).collect())
    }

    async fn set_active(&self, kind: &KindId, active: bool) -> anyhow::Result<bool> {
        let done = sqlx::query("UPDATE resource_kinds SET is_active = ? WHERE kind = ?")
            .bind(active)
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;

        Ok(done.rows_affected() > 0)
    }

    async fn delete(&self, kind: &KindId) -> anyhow::Result<bool> {
        let done = sqlx::query("DELETE FROM resource_kinds WHERE kind = ?")
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;

        Ok(done.rows_affected() > 0)
    }
}
