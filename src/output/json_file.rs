//! JSON-lines file sink
//!
//! Each record is written as one line and flushed immediately, so a crawl
//! interrupted midway still leaves a readable file.

use crate::output::traits::{Record, ScraperSink, SinkResult};
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

pub struct JsonLinesSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    /// Opens `path` for appending, creating it if needed
    pub fn create(path: impl AsRef<Path>) -> SinkResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        tracing::debug!("Writing records to {}", path.display());

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(File::from_std(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ScraperSink for JsonLinesSink {
    async fn publish(&self, record: &Record) -> SinkResult<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "json-lines"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};
    use tempfile::TempDir;

    fn record(url: &str, title: &str) -> Record {
        let mut fields = Map::new();
        fields.insert("title".to_string(), Value::String(title.to_string()));
        Record::new(url, fields)
    }

    #[tokio::test]
    async fn test_writes_one_line_per_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.jsonl");
        let sink = JsonLinesSink::create(&path).unwrap();

        sink.publish(&record("https://example.test/1", "One"))
            .await
            .unwrap();
        sink.publish(&record("https://example.test/2", "Two"))
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            json!({"url": "https://example.test/1", "fields": {"title": "One"}})
        );
        assert_eq!(lines[1]["fields"]["title"], "Two");
    }

    #[tokio::test]
    async fn test_appends_to_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.jsonl");
        std::fs::write(&path, "{\"previous\":true}\n").unwrap();

        let sink = JsonLinesSink::create(&path).unwrap();
        sink.publish(&record("https://example.test/1", "One"))
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_create_fails_for_missing_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("records.jsonl");
        assert!(JsonLinesSink::create(path).is_err());
    }
}
