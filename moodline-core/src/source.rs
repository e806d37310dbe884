use bytes::Bytes;

use crate::error::Result;

/// The live data file appended to by the external producer.
pub(crate) mod file;

/// Splits raw chunks into validated records.
pub(crate) mod parser;

/// Set of items to be implemented to become a source for the pipeline.
///
/// A source hands out the bytes appended past a given offset; it never owns
/// the read position. The committed offset is threaded in by the caller so
/// that a failed batch is naturally re-read on the next poll.
#[trait_variant::make(SourceReader: Send)]
#[allow(dead_code)]
pub(crate) trait LocalSourceReader {
    /// Name of the source.
    fn name(&self) -> &'static str;

    /// Read the bytes appended past `offset`, bounded by the reader's chunk
    /// cap. An empty chunk means nothing new this cycle.
    async fn read(&mut self, offset: u64) -> Result<Bytes>;
}
