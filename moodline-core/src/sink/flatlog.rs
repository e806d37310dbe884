//! CSV append log. The header is written once when the file is created;
//! rows are appended in commit order and never rewritten in place. Each
//! append is flushed and fsynced before it is acknowledged, and a replayed
//! append (offset not beyond the last row) is skipped so a crash between
//! the append and the offset advance never duplicates a row.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::message::SinkRow;
use crate::sink::FlatSink;

const HEADER: [&str; 8] = [
    "offset",
    "message",
    "author",
    "category",
    "keyword_mentioned",
    "sentiment_label",
    "sentiment_score",
    "timestamp",
];

#[derive(Debug)]
pub(crate) struct CsvSink {
    path: PathBuf,
    last_offset: Option<u64>,
}

impl CsvSink {
    pub(crate) fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let last_offset = read_last_offset(&path)?;
        Ok(CsvSink { path, last_offset })
    }
}

impl FlatSink for CsvSink {
    async fn append(&mut self, row: &SinkRow) -> Result<()> {
        if self.last_offset.is_some_and(|last| row.offset <= last) {
            debug!(offset = row.offset, "skipping replayed append");
            return Ok(());
        }

        let write_header = std::fs::metadata(&self.path)
            .map(|metadata| metadata.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                Error::Sink(format!("failed to open {}: {e}", self.path.display()))
            })?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if write_header {
            writer.write_record(HEADER)?;
        }
        writer.write_record([
            row.offset.to_string().as_str(),
            row.message.as_str(),
            row.author.as_deref().unwrap_or_default(),
            row.category.as_deref().unwrap_or_default(),
            row.keyword_mentioned.as_deref().unwrap_or_default(),
            row.sentiment_label.as_str(),
            row.sentiment_score.to_string().as_str(),
            row.timestamp.as_str(),
        ])?;
        writer.flush().map_err(|e| Error::Sink(e.to_string()))?;

        let file = writer
            .into_inner()
            .map_err(|e| Error::Sink(format!("failed to flush csv writer: {e}")))?;
        file.sync_all()
            .map_err(|e| Error::Sink(format!("failed to fsync flat log: {e}")))?;

        self.last_offset = Some(row.offset);
        Ok(())
    }

    async fn last_offset(&mut self) -> Result<Option<u64>> {
        Ok(self.last_offset)
    }
}

/// Scan the existing log for the offset of its final row. Only runs at
/// startup; appends afterwards track the value in memory.
fn read_last_offset(path: &Path) -> Result<Option<u64>> {
    let mut reader = match csv::Reader::from_path(path) {
        Ok(reader) => reader,
        Err(e) => {
            return match e.kind() {
                csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound => Ok(None),
                _ => Err(Error::Sink(format!(
                    "failed to open flat log {}: {e}",
                    path.display()
                ))),
            };
        }
    };

    let mut last = None;
    for record in reader.records() {
        let record = record?;
        let offset = record
            .get(0)
            .and_then(|field| field.parse::<u64>().ok())
            .ok_or_else(|| {
                Error::Sink(format!(
                    "flat log {} has a row without a numeric offset",
                    path.display()
                ))
            })?;
        last = Some(offset);
    }
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row(offset: u64, message: &str) -> SinkRow {
        SinkRow {
            offset,
            message: message.to_string(),
            author: Some("Charlie".to_string()),
            category: Some("humor".to_string()),
            keyword_mentioned: None,
            sentiment_label: "positive".to_string(),
            sentiment_score: 0.25,
            timestamp: "2025-01-29T14:35:20Z".to_string(),
        }
    }

    fn read_rows(path: &Path) -> Vec<csv::StringRecord> {
        csv::Reader::from_path(path)
            .unwrap()
            .records()
            .map(|record| record.unwrap())
            .collect()
    }

    #[tokio::test]
    async fn header_is_written_exactly_once() {
        let tmp_dir = tempfile::TempDir::new().unwrap();
        let path = tmp_dir.path().join("log.csv");
        let mut sink = CsvSink::open(&path).unwrap();

        sink.append(&sample_row(10, "one")).await.unwrap();
        sink.append(&sample_row(20, "two")).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.matches("offset,message").count(), 1);
        assert_eq!(read_rows(&path).len(), 2);
    }

    #[tokio::test]
    async fn rows_carry_all_fields_in_commit_order() {
        let tmp_dir = tempfile::TempDir::new().unwrap();
        let path = tmp_dir.path().join("log.csv");
        let mut sink = CsvSink::open(&path).unwrap();

        sink.append(&sample_row(10, "first")).await.unwrap();
        sink.append(&sample_row(20, "second")).await.unwrap();

        let rows = read_rows(&path);
        assert_eq!(rows[0].get(0), Some("10"));
        assert_eq!(rows[0].get(1), Some("first"));
        assert_eq!(rows[0].get(2), Some("Charlie"));
        assert_eq!(rows[0].get(5), Some("positive"));
        assert_eq!(rows[0].get(7), Some("2025-01-29T14:35:20Z"));
        assert_eq!(rows[1].get(0), Some("20"));
    }

    #[tokio::test]
    async fn replayed_append_is_skipped() {
        let tmp_dir = tempfile::TempDir::new().unwrap();
        let path = tmp_dir.path().join("log.csv");
        let mut sink = CsvSink::open(&path).unwrap();

        sink.append(&sample_row(10, "one")).await.unwrap();
        sink.append(&sample_row(10, "one")).await.unwrap();

        assert_eq!(read_rows(&path).len(), 1);
    }

    #[tokio::test]
    async fn reopen_resumes_after_the_last_row() {
        let tmp_dir = tempfile::TempDir::new().unwrap();
        let path = tmp_dir.path().join("log.csv");

        {
            let mut sink = CsvSink::open(&path).unwrap();
            sink.append(&sample_row(10, "one")).await.unwrap();
            sink.append(&sample_row(20, "two")).await.unwrap();
        }

        // a restart must not re-append rows the log already holds
        let mut sink = CsvSink::open(&path).unwrap();
        assert_eq!(sink.last_offset().await.unwrap(), Some(20));
        sink.append(&sample_row(20, "two")).await.unwrap();
        sink.append(&sample_row(30, "three")).await.unwrap();

        let rows = read_rows(&path);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].get(0), Some("30"));
    }

    #[tokio::test]
    async fn empty_log_reports_no_offset() {
        let tmp_dir = tempfile::TempDir::new().unwrap();
        let mut sink = CsvSink::open(tmp_dir.path().join("log.csv")).unwrap();
        assert_eq!(sink.last_offset().await.unwrap(), None);
    }

    #[tokio::test]
    async fn fields_with_commas_survive_the_round_trip() {
        let tmp_dir = tempfile::TempDir::new().unwrap();
        let path = tmp_dir.path().join("log.csv");
        let mut sink = CsvSink::open(&path).unwrap();

        sink.append(&sample_row(10, "well, that was \"fun\""))
            .await
            .unwrap();

        let rows = read_rows(&path);
        assert_eq!(rows[0].get(1), Some("well, that was \"fun\""));
    }
}
