use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

use crate::db;

/// Create the index schema. Idempotent.
pub async fn run_migrations(path: &Path) -> Result<()> {
    let pool = db::connect(path).await?;
    create_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // Segments keep corpus order in `position`; retrieval ties break on it.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS segments (
            position INTEGER PRIMARY KEY,
            segment_id TEXT NOT NULL,
            text TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS segment_vectors (
            position INTEGER PRIMARY KEY,
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            FOREIGN KEY (position) REFERENCES segments(position)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
