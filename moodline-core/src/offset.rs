//! Durable store for the single persisted fact of the pipeline: the highest
//! offset successfully written to both sinks. The value is read once at
//! startup and mutated only by the sink writer after both sinks have
//! acknowledged a record.

use std::path::PathBuf;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::{Error, Result};

/// File-backed offset store. `advance` is durable before it returns, so a
/// restart after a crash resumes exactly at the last acknowledged offset.
#[derive(Debug)]
pub struct OffsetStore {
    path: PathBuf,
    current: u64,
}

impl OffsetStore {
    /// Read the last committed offset from disk, resuming at 0 when no state
    /// exists yet.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let current = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents.trim().parse::<u64>().map_err(|e| {
                Error::OffsetStore(format!(
                    "offset state at {} is corrupt: {e}",
                    path.display()
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => {
                return Err(Error::OffsetStore(format!(
                    "failed to read offset state at {}: {e}",
                    path.display()
                )));
            }
        };
        info!(offset = current, path = %path.display(), "loaded committed offset");
        Ok(OffsetStore { path, current })
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    /// Persist `new` as the committed offset. Equal offsets are a no-op;
    /// moving backward is a programming-invariant violation and fatal.
    pub async fn advance(&mut self, new: u64) -> Result<()> {
        if new < self.current {
            return Err(Error::OffsetRegression(format!(
                "attempted to move the committed offset backward from {} to {}",
                self.current, new
            )));
        }
        if new == self.current {
            return Ok(());
        }

        // write-then-rename so a crash mid-write never leaves a torn value
        let tmp_path = self.path.with_extension("offset.tmp");
        let mut tmp = File::create(&tmp_path).await.map_err(|e| {
            Error::OffsetStore(format!(
                "failed to create {}: {e}",
                tmp_path.display()
            ))
        })?;
        tmp.write_all(new.to_string().as_bytes())
            .await
            .map_err(|e| Error::OffsetStore(format!("failed to write offset: {e}")))?;
        tmp.sync_all()
            .await
            .map_err(|e| Error::OffsetStore(format!("failed to fsync offset: {e}")))?;
        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| {
            Error::OffsetStore(format!(
                "failed to move offset state into place at {}: {e}",
                self.path.display()
            ))
        })?;
        // the rename itself must survive a crash, so flush the directory too
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            let dir = OpenOptions::new().read(true).open(parent).await.map_err(|e| {
                Error::OffsetStore(format!("failed to open offset dir: {e}"))
            })?;
            dir.sync_all()
                .await
                .map_err(|e| Error::OffsetStore(format!("failed to fsync offset dir: {e}")))?;
        }

        self.current = new;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_defaults_to_zero_without_state() {
        let tmp_dir = tempfile::TempDir::new().unwrap();
        let store = OffsetStore::load(tmp_dir.path().join("consumer.offset"))
            .await
            .unwrap();
        assert_eq!(store.current(), 0);
    }

    #[tokio::test]
    async fn advance_survives_reload() {
        let tmp_dir = tempfile::TempDir::new().unwrap();
        let path = tmp_dir.path().join("consumer.offset");

        let mut store = OffsetStore::load(&path).await.unwrap();
        store.advance(42).await.unwrap();
        store.advance(99).await.unwrap();
        assert_eq!(store.current(), 99);

        // simulated restart resumes exactly at the last acknowledged offset
        let reloaded = OffsetStore::load(&path).await.unwrap();
        assert_eq!(reloaded.current(), 99);
    }

    #[tokio::test]
    async fn advance_to_current_is_a_noop() {
        let tmp_dir = tempfile::TempDir::new().unwrap();
        let path = tmp_dir.path().join("consumer.offset");

        let mut store = OffsetStore::load(&path).await.unwrap();
        store.advance(10).await.unwrap();
        store.advance(10).await.unwrap();
        assert_eq!(store.current(), 10);
    }

    #[tokio::test]
    async fn backward_advance_is_a_regression() {
        let tmp_dir = tempfile::TempDir::new().unwrap();
        let path = tmp_dir.path().join("consumer.offset");

        let mut store = OffsetStore::load(&path).await.unwrap();
        store.advance(10).await.unwrap();
        let err = store.advance(3).await.unwrap_err();
        assert!(matches!(err, Error::OffsetRegression(_)));
        // the stored value is untouched
        assert_eq!(store.current(), 10);
        let reloaded = OffsetStore::load(&path).await.unwrap();
        assert_eq!(reloaded.current(), 10);
    }

    #[tokio::test]
    async fn corrupt_state_fails_load() {
        let tmp_dir = tempfile::TempDir::new().unwrap();
        let path = tmp_dir.path().join("consumer.offset");
        tokio::fs::write(&path, "not-a-number").await.unwrap();

        let err = OffsetStore::load(&path).await.unwrap_err();
        assert!(matches!(err, Error::OffsetStore(_)));
    }
}
