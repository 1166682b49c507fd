//! SQLite pool for the watermark database.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::time::Duration;

use crate::config::Config;

/// Open the watermark database, creating the file (and its parent
/// directory) if missing.
///
/// The watermark table has a single writer, the sequential indexing
/// pass; the CLI and the status endpoint only read. Two connections
/// cover that, and WAL keeps the reads from blocking the pass. The
/// busy timeout absorbs the rare overlap of `plenum watermarks` with
/// a running pass.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    if let Some(parent) = config.db.path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(&config.db.path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(2)
        .connect_with(options)
        .await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;
    use std::io::Write;

    #[tokio::test]
    async fn connect_creates_file_and_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested/state/watermarks.db");
        let toml = format!(
            r#"
            [db]
            path = "{}"

            [api]
            base_url = "http://localhost:0"

            [qdrant]
            url = "http://localhost:0"
            collection = "test"

            [indexing]
            terms = [20]
            categories = ["inquiry"]

            [server]
            bind = "127.0.0.1:0"
            "#,
            db_path.display()
        );
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(toml.as_bytes()).unwrap();
        let config = load_config(f.path()).unwrap();

        let pool = connect(&config).await.unwrap();
        crate::migrate::apply(&pool).await.unwrap();
        assert!(db_path.exists());

        // The schema is usable through the fresh pool.
        let store = crate::watermark::WatermarkStore::new(pool);
        assert!(store.all().await.unwrap().is_empty());
    }
}
