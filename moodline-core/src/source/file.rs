//! File source: tails the producer's live data file by seeking to the last
//! committed offset and reading whatever has been appended since. The file is
//! only ever read; truncation or rewriting by the producer is a contract
//! violation, not something this source recovers from.

use std::io::SeekFrom;
use std::path::PathBuf;

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::source::SourceReader;

const DEFAULT_MAX_CHUNK_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Debug)]
pub(crate) struct FileSource {
    path: PathBuf,
    max_chunk_bytes: u64,
}

impl FileSource {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        FileSource {
            path: path.into(),
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
        }
    }
}

impl SourceReader for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn read(&mut self, offset: u64) -> Result<Bytes> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // the producer has not created the file yet
                debug!(path = %self.path.display(), "source file absent; nothing to read");
                return Ok(Bytes::new());
            }
            Err(e) => {
                return Err(Error::Source(format!(
                    "failed to stat {}: {e}",
                    self.path.display()
                )));
            }
        };

        let size = metadata.len();
        if size < offset {
            // append-only contract broken upstream; keep polling rather than
            // guessing at a new position
            warn!(
                path = %self.path.display(),
                committed = offset,
                size,
                "source file is smaller than the committed offset"
            );
            return Ok(Bytes::new());
        }
        if size == offset {
            return Ok(Bytes::new());
        }

        let mut file = File::open(&self.path).await.map_err(|e| {
            Error::Source(format!("failed to open {}: {e}", self.path.display()))
        })?;
        file.seek(SeekFrom::Start(offset)).await.map_err(|e| {
            Error::Source(format!(
                "failed to seek {} to offset {offset}: {e}",
                self.path.display()
            ))
        })?;

        let to_read = (size - offset).min(self.max_chunk_bytes);
        let mut buffer = Vec::with_capacity(to_read as usize);
        file.take(to_read)
            .read_to_end(&mut buffer)
            .await
            .map_err(|e| {
                Error::Source(format!("failed to read {}: {e}", self.path.display()))
            })?;

        Ok(buffer.into())
    }
}
