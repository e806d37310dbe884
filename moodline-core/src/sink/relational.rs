//! SQLite-backed relational sink. The table is keyed by the record's end
//! offset in the source file, and every write is an upsert on that key so a
//! replayed commit converges on the same row instead of duplicating it.

use std::path::Path;

use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};

use crate::error::Result;
use crate::message::SinkRow;
use crate::sink::RelationalSink;

#[derive(Debug)]
pub(crate) struct SqliteSink {
    pool: SqlitePool,
}

impl SqliteSink {
    pub(crate) async fn connect(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        sqlx::query(
            r#"
CREATE TABLE IF NOT EXISTS enriched_messages (
    "offset" INTEGER PRIMARY KEY,
    message TEXT NOT NULL,
    author TEXT,
    category TEXT,
    keyword_mentioned TEXT,
    sentiment_label TEXT NOT NULL,
    sentiment_score REAL NOT NULL,
    timestamp TEXT NOT NULL
);
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(SqliteSink { pool })
    }
}

impl RelationalSink for SqliteSink {
    async fn upsert(&mut self, row: &SinkRow) -> Result<()> {
        sqlx::query(
            r#"
INSERT INTO enriched_messages (
    "offset", message, author, category, keyword_mentioned,
    sentiment_label, sentiment_score, timestamp
)
VALUES ( $1, $2, $3, $4, $5, $6, $7, $8 )
ON CONFLICT ( "offset" )
DO UPDATE SET
    message = excluded.message,
    author = excluded.author,
    category = excluded.category,
    keyword_mentioned = excluded.keyword_mentioned,
    sentiment_label = excluded.sentiment_label,
    sentiment_score = excluded.sentiment_score,
    timestamp = excluded.timestamp;
            "#,
        )
        .bind(row.offset as i64)
        .bind(&row.message)
        .bind(&row.author)
        .bind(&row.category)
        .bind(&row.keyword_mentioned)
        .bind(&row.sentiment_label)
        .bind(row.sentiment_score)
        .bind(&row.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn max_offset(&mut self) -> Result<Option<u64>> {
        let row = sqlx::query(r#"SELECT MAX("offset") AS max_offset FROM enriched_messages;"#)
            .fetch_one(&self.pool)
            .await?;
        let max: Option<i64> = row.get("max_offset");
        Ok(max.map(|v| v as u64))
    }

    async fn rows_in_range(&mut self, after: u64, up_to: u64) -> Result<Vec<SinkRow>> {
        let rows = sqlx::query(
            r#"
SELECT "offset", message, author, category, keyword_mentioned,
       sentiment_label, sentiment_score, timestamp
FROM enriched_messages
WHERE "offset" > $1 AND "offset" <= $2
ORDER BY "offset" ASC;
            "#,
        )
        .bind(after as i64)
        .bind(up_to as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SinkRow {
                offset: row.get::<i64, _>("offset") as u64,
                message: row.get("message"),
                author: row.get("author"),
                category: row.get("category"),
                keyword_mentioned: row.get("keyword_mentioned"),
                sentiment_label: row.get("sentiment_label"),
                sentiment_score: row.get("sentiment_score"),
                timestamp: row.get("timestamp"),
            })
            .collect())
    }
}
