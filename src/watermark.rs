//! Watermark store.
//!
//! Persists "indexed through" progress per (electoral term, document
//! category) in the embedded SQLite database. Upsert semantics: the
//! timestamp is replaced, the count is added. Rows are created on the
//! first successful pass and only ever deleted by an explicit reset.
//!
//! When the table is empty but the vector store already holds points
//! (an index built before watermarks existed), [`WatermarkStore::bootstrap`]
//! seeds the table from the maximum content date observed per pair, so
//! the first incremental pass does not degenerate into a full re-index.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use tracing::info;

use crate::models::{DocCategory, Watermark};
use crate::vector::VectorStore;

const BOOTSTRAP_SCROLL_PAGE: usize = 500;

pub struct WatermarkStore {
    pool: SqlitePool,
}

impl WatermarkStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, term: u32, category: DocCategory) -> Result<Option<Watermark>> {
        let row = sqlx::query(
            "SELECT last_indexed_at, indexed_count FROM watermarks WHERE term = ? AND category = ?",
        )
        .bind(term as i64)
        .bind(category.label())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Watermark {
            term,
            category,
            last_indexed_at: timestamp_to_utc(r.get::<i64, _>("last_indexed_at")),
            indexed_count: r.get::<i64, _>("indexed_count"),
        }))
    }

    pub async fn all(&self) -> Result<Vec<Watermark>> {
        let rows = sqlx::query(
            "SELECT term, category, last_indexed_at, indexed_count FROM watermarks \
             ORDER BY term, category",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|r| {
                let category = DocCategory::parse_label(r.get::<String, _>("category").as_str())?;
                Some(Watermark {
                    term: r.get::<i64, _>("term") as u32,
                    category,
                    last_indexed_at: timestamp_to_utc(r.get::<i64, _>("last_indexed_at")),
                    indexed_count: r.get::<i64, _>("indexed_count"),
                })
            })
            .collect())
    }

    /// Replace the timestamp, add to the count.
    pub async fn upsert(
        &self,
        term: u32,
        category: DocCategory,
        last_indexed_at: DateTime<Utc>,
        newly_indexed: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO watermarks (term, category, last_indexed_at, indexed_count)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(term, category) DO UPDATE SET
                last_indexed_at = excluded.last_indexed_at,
                indexed_count = indexed_count + excluded.indexed_count
            "#,
        )
        .bind(term as i64)
        .bind(category.label())
        .bind(last_indexed_at.timestamp())
        .bind(newly_indexed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Explicit reset; the only delete path.
    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM watermarks").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM watermarks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count == 0)
    }

    /// Seed watermarks from existing index contents.
    ///
    /// Runs only when the table is empty and the vector store is not;
    /// never overwrites a non-empty table. Returns the number of
    /// (term, category) pairs seeded.
    pub async fn bootstrap(&self, store: &dyn VectorStore) -> Result<usize> {
        if !self.is_empty().await? {
            return Ok(0);
        }
        if store.count().await? == 0 {
            return Ok(0);
        }

        // (term, category) -> (max content date, point count)
        let mut maxima: HashMap<(u32, DocCategory), (NaiveDate, i64)> = HashMap::new();
        let mut offset = None;
        loop {
            let (payloads, next) = store.scroll_payloads(offset, BOOTSTRAP_SCROLL_PAGE).await?;
            for payload in &payloads {
                let Some(term) = payload.get("term").and_then(serde_json::Value::as_u64) else {
                    continue;
                };
                let Some(category) = payload
                    .get("category")
                    .and_then(serde_json::Value::as_str)
                    .and_then(DocCategory::parse_label)
                else {
                    continue;
                };
                let Some(date) = payload
                    .get("date")
                    .and_then(serde_json::Value::as_str)
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                else {
                    continue;
                };
                maxima
                    .entry((term as u32, category))
                    .and_modify(|(max, count)| {
                        if date > *max {
                            *max = date;
                        }
                        *count += 1;
                    })
                    .or_insert((date, 1));
            }
            match next {
                Some(n) => offset = Some(n),
                None => break,
            }
        }

        for ((term, category), (max_date, count)) in &maxima {
            let ts = max_date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc())
                .unwrap_or_else(Utc::now);
            self.upsert(*term, *category, ts, *count).await?;
            info!(term, category = %category, date = %max_date, "watermark seeded from index");
        }
        Ok(maxima.len())
    }
}

fn timestamp_to_utc(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Point;
    use crate::vector::InMemoryStore;
    use chrono::TimeZone;
    use serde_json::json;

    async fn store() -> WatermarkStore {
        // A single connection: every pooled connection to
        // "sqlite::memory:" would otherwise be its own database.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::migrate::apply(&pool).await.unwrap();
        WatermarkStore::new(pool)
    }

    fn ts(s: &str) -> DateTime<Utc> {
        chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .unwrap()
            .and_utc()
    }

    #[tokio::test]
    async fn upsert_replaces_timestamp_and_adds_count() {
        let wm = store().await;
        wm.upsert(20, DocCategory::Bill, ts("2024-01-01 08:00:00"), 10)
            .await
            .unwrap();
        wm.upsert(20, DocCategory::Bill, ts("2024-02-01 08:00:00"), 5)
            .await
            .unwrap();

        let got = wm.get(20, DocCategory::Bill).await.unwrap().unwrap();
        assert_eq!(got.last_indexed_at, ts("2024-02-01 08:00:00"));
        assert_eq!(got.indexed_count, 15);
    }

    #[tokio::test]
    async fn missing_pair_reads_as_none() {
        let wm = store().await;
        assert!(wm.get(19, DocCategory::Motion).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let wm = store().await;
        wm.upsert(20, DocCategory::Bill, Utc::now(), 1).await.unwrap();
        wm.upsert(20, DocCategory::Transcript, Utc::now(), 1)
            .await
            .unwrap();
        assert_eq!(wm.clear().await.unwrap(), 2);
        assert!(wm.is_empty().await.unwrap());
    }

    fn payload_point(id: u64, term: u32, category: &str, date: &str) -> Point {
        Point {
            id,
            vector: vec![0.0],
            payload: json!({ "term": term, "category": category, "date": date }),
        }
    }

    #[tokio::test]
    async fn bootstrap_seeds_maxima_per_pair() {
        let wm = store().await;
        let index = InMemoryStore::new();
        index
            .upsert(&[
                payload_point(1, 20, "bill", "2024-01-10"),
                payload_point(2, 20, "bill", "2024-03-05"),
                payload_point(3, 20, "transcript", "2024-02-20"),
                payload_point(4, 19, "bill", "2021-06-01"),
            ])
            .await
            .unwrap();

        let seeded = wm.bootstrap(&index).await.unwrap();
        assert_eq!(seeded, 3);

        let bill = wm.get(20, DocCategory::Bill).await.unwrap().unwrap();
        assert_eq!(
            bill.last_indexed_at,
            Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap()
        );
        assert_eq!(bill.indexed_count, 2);
    }

    #[tokio::test]
    async fn bootstrap_never_overwrites_existing_watermarks() {
        let wm = store().await;
        wm.upsert(20, DocCategory::Bill, ts("2025-01-01 00:00:00"), 99)
            .await
            .unwrap();

        let index = InMemoryStore::new();
        index
            .upsert(&[payload_point(1, 20, "bill", "2024-01-10")])
            .await
            .unwrap();

        assert_eq!(wm.bootstrap(&index).await.unwrap(), 0);
        let got = wm.get(20, DocCategory::Bill).await.unwrap().unwrap();
        assert_eq!(got.indexed_count, 99);
    }

    #[tokio::test]
    async fn bootstrap_on_empty_index_is_a_no_op() {
        let wm = store().await;
        let index = InMemoryStore::new();
        assert_eq!(wm.bootstrap(&index).await.unwrap(), 0);
        assert!(wm.is_empty().await.unwrap());
    }
}
