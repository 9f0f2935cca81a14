//! Daily append-only reading log
//!
//! Lines go to `<base_dir>/<YYYY-MM-DD>/<file_name>`, the date taken from
//! the reading timestamp so a late write never lands in the wrong day.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::SinkError;
use crate::storage::traits::LogSink;

#[derive(Debug, Clone)]
pub struct DailyLogSink {
    base_dir: PathBuf,
    file_name: String,
}

impl DailyLogSink {
    pub fn new(base_dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            file_name: file_name.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// File that holds lines for `timestamp`'s day
    pub fn path_for(&self, timestamp: DateTime<Utc>) -> PathBuf {
        self.base_dir
            .join(timestamp.format("%Y-%m-%d").to_string())
            .join(&self.file_name)
    }
}

#[async_trait]
impl LogSink for DailyLogSink {
    async fn append_line(&self, timestamp: DateTime<Utc>, line: &str) -> Result<(), SinkError> {
        let path = self.path_for(timestamp);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line.trim_end_matches(&['\r', '\n'][..]));
        buf.push('\n');
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;

        debug!("Appended {} bytes to {}", buf.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_appends_into_dated_directory() {
        let dir = TempDir::new().unwrap();
        let sink = DailyLogSink::new(dir.path(), "readings.log");
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 45).unwrap();

        sink.append_line(ts, "[2024-01-15T10:30:45] ID:Device5, temperature_C:25.5")
            .await
            .unwrap();
        sink.append_line(ts, "[2024-01-15T10:35:45] ID:Device5, temperature_C:25.7\n")
            .await
            .unwrap();

        let path = dir.path().join("2024-01-15").join("readings.log");
        assert_eq!(sink.path_for(ts), path);

        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(
            content,
            "[2024-01-15T10:30:45] ID:Device5, temperature_C:25.5\n\
             [2024-01-15T10:35:45] ID:Device5, temperature_C:25.7\n"
        );
    }

    #[tokio::test]
    async fn test_day_rollover_uses_reading_timestamp() {
        let dir = TempDir::new().unwrap();
        let sink = DailyLogSink::new(dir.path(), "readings.log");

        let before = Utc.with_ymd_and_hms(2024, 1, 15, 23, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 1, 16, 0, 0, 1).unwrap();
        sink.append_line(before, "a").await.unwrap();
        sink.append_line(after, "b").await.unwrap();

        assert!(dir.path().join("2024-01-15/readings.log").exists());
        assert!(dir.path().join("2024-01-16/readings.log").exists());
    }

    #[tokio::test]
    async fn test_unwritable_base_is_io_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();

        let sink = DailyLogSink::new(&blocker, "readings.log");
        let err = sink.append_line(Utc::now(), "line").await.unwrap_err();
        assert!(matches!(err, SinkError::Io(_)));
    }
}
