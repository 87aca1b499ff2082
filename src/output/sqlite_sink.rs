//! SQLite record sink
//!
//! Records are stored one row each, with the field map kept as JSON text.

use crate::output::traits::{Record, ScraperSink, SinkResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT NOT NULL,
        data TEXT NOT NULL,
        scraped_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_records_url ON records(url);
";

/// A record as read back from the database
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: i64,
    pub url: String,
    pub data: String,
    pub scraped_at: String,
}

pub struct SqliteSink {
    conn: Mutex<Connection>,
}

impl SqliteSink {
    /// Opens or creates the database at `path`
    pub fn open(path: &Path) -> SinkResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        conn.execute_batch(SCHEMA)?;

        tracing::debug!("Writing records to database {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> SinkResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn count_records(&self) -> SinkResult<u64> {
        let count: i64 = self
            .lock()
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Returns every stored record in insertion order
    pub fn records(&self) -> SinkResult<Vec<StoredRecord>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT id, url, data, scraped_at FROM records ORDER BY id")?;

        let rows = stmt.query_map([], |row| {
            Ok(StoredRecord {
                id: row.get(0)?,
                url: row.get(1)?,
                data: row.get(2)?,
                scraped_at: row.get(3)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

#[async_trait]
impl ScraperSink for SqliteSink {
    async fn publish(&self, record: &Record) -> SinkResult<()> {
        let data = serde_json::to_string(&record.fields)?;
        let now = Utc::now().to_rfc3339();

        self.lock().execute(
            "INSERT INTO records (url, data, scraped_at) VALUES (?1, ?2, ?3)",
            params![record.url, data, now],
        )?;
        Ok(())
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};
    use tempfile::TempDir;

    fn record(url: &str, price: f64) -> Record {
        let mut fields = Map::new();
        fields.insert("price".to_string(), serde_json::json!(price));
        Record::new(url, fields)
    }

    #[tokio::test]
    async fn test_publish_stores_rows() {
        let sink = SqliteSink::open_in_memory().unwrap();

        sink.publish(&record("https://example.test/1", 1.5))
            .await
            .unwrap();
        sink.publish(&record("https://example.test/2", 2.0))
            .await
            .unwrap();

        assert_eq!(sink.count_records().unwrap(), 2);

        let rows = sink.records().unwrap();
        assert_eq!(rows[0].url, "https://example.test/1");
        let data: Value = serde_json::from_str(&rows[0].data).unwrap();
        assert_eq!(data["price"], 1.5);
        assert!(chrono::DateTime::parse_from_rfc3339(&rows[0].scraped_at).is_ok());
    }

    #[tokio::test]
    async fn test_reopen_keeps_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.db");

        {
            let sink = SqliteSink::open(&path).unwrap();
            sink.publish(&record("https://example.test/1", 3.0))
                .await
                .unwrap();
        }

        let sink = SqliteSink::open(&path).unwrap();
        assert_eq!(sink.count_records().unwrap(), 1);
    }
}
