//! Schema migrations for the watermark database.
//!
//! Idempotent: every statement is `IF NOT EXISTS`, so `plenum init`
//! can be run any number of times.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn apply(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS watermarks (
            term            INTEGER NOT NULL,
            category        TEXT    NOT NULL,
            last_indexed_at INTEGER NOT NULL,
            indexed_count   INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (term, category)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
