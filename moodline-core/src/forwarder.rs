//! The forwarder orchestrates the consumption cycle: read the bytes past
//! the committed offset, parse them into records, score each record, and
//! commit record-by-record to both sinks. The cycle repeats until the
//! cancellation token fires; the token is only observed between cycles so a
//! commit in progress always runs to completion.
//!
//! ```text
//! Idle -> Reading -> Processing -> Committing -> Idle
//!                                      |
//!                                      v
//!                                  Stopped (cancellation)
//! ```
//!
//! Transient errors (source unreadable, sink unreachable) never stop the
//! loop: the offset did not advance, so the next poll re-reads the same
//! bytes and the loop itself is the retry mechanism. Only invariant
//! violations propagate.

use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::Result;
use crate::message::EnrichedMessage;
use crate::sink::{FlatSink, RelationalSink, SinkWriter};
use crate::source::parser::{self, ParsedItem};
use crate::source::SourceReader;
use crate::transformer::lexicon::LexiconScorer;
use crate::transformer::SentimentScorer;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_BATCH_SIZE: usize = 500;

/// Forwarder is responsible for reading records from the source, enriching
/// them with a sentiment, writing them to both sinks, and advancing the
/// committed offset.
pub(crate) struct Forwarder<S, R, F> {
    source: S,
    scorer: Box<dyn SentimentScorer>,
    sink_writer: SinkWriter<R, F>,
    cln_token: CancellationToken,
    poll_interval: Duration,
    batch_size: usize,
}

/// ForwarderBuilder is used to build a Forwarder instance with optional fields.
pub(crate) struct ForwarderBuilder<S, R, F> {
    source: S,
    sink_writer: SinkWriter<R, F>,
    cln_token: CancellationToken,
    scorer: Option<Box<dyn SentimentScorer>>,
    poll_interval: Duration,
    batch_size: usize,
}

impl<S, R, F> ForwarderBuilder<S, R, F>
where
    S: SourceReader,
    R: RelationalSink,
    F: FlatSink,
{
    /// Create a new builder with mandatory fields
    pub(crate) fn new(
        source: S,
        sink_writer: SinkWriter<R, F>,
        cln_token: CancellationToken,
    ) -> Self {
        Self {
            source,
            sink_writer,
            cln_token,
            scorer: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Replace the built-in lexicon scorer
    pub(crate) fn scorer(mut self, scorer: Box<dyn SentimentScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub(crate) fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub(crate) fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Build the Forwarder instance
    #[must_use]
    pub(crate) fn build(self) -> Forwarder<S, R, F> {
        Forwarder {
            source: self.source,
            scorer: self.scorer.unwrap_or_else(|| Box::new(LexiconScorer)),
            sink_writer: self.sink_writer,
            cln_token: self.cln_token,
            poll_interval: self.poll_interval,
            batch_size: self.batch_size,
        }
    }
}

impl<S, R, F> Forwarder<S, R, F>
where
    S: SourceReader,
    R: RelationalSink,
    F: FlatSink,
{
    /// Run the consumption cycle until the cancellation token fires. Returns
    /// an error only for invariant violations; everything else is retried on
    /// the next poll.
    pub(crate) async fn start(&mut self) -> Result<()> {
        info!(
            source = self.source.name(),
            offset = self.sink_writer.committed_offset(),
            "starting the consumption loop"
        );
        let mut processed_msgs_count: usize = 0;
        let mut last_logged_at = std::time::Instant::now();

        loop {
            if self.cln_token.is_cancelled() {
                break;
            }

            processed_msgs_count += match self.read_and_process().await {
                Ok(count) => count,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(?e, "cycle failed; retrying on the next poll");
                    0
                }
            };

            if processed_msgs_count > 0 && last_logged_at.elapsed().as_millis() >= 1000 {
                info!(
                    "Processed {} messages at time {}",
                    processed_msgs_count,
                    Utc::now()
                );
                processed_msgs_count = 0;
                last_logged_at = std::time::Instant::now();
            }

            // idle wait between cycles; shutdown is honored here, never
            // mid-commit
            tokio::select! {
                _ = self.cln_token.cancelled() => break,
                _ = sleep(self.poll_interval) => {}
            }
        }

        info!("Consumption loop stopped");
        Ok(())
    }

    /// One Reading -> Processing -> Committing pass. Returns the number of
    /// records committed.
    async fn read_and_process(&mut self) -> Result<usize> {
        let committed = self.sink_writer.committed_offset();
        let chunk = self.source.read(committed).await?;
        if chunk.is_empty() {
            return Ok(0);
        }

        let batch = parser::parse_chunk(&chunk, committed);
        let mut processed = 0;

        for item in batch.items.into_iter().take(self.batch_size) {
            match item {
                ParsedItem::Record(message) => {
                    let sentiment = self.scorer.score(&message.text);
                    let enriched = EnrichedMessage::new(message, sentiment);
                    match self.sink_writer.commit(&enriched).await {
                        Ok(()) => processed += 1,
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            // fail-fast per batch: the offset did not advance,
                            // so the remainder is re-read on the next poll
                            warn!(
                                ?e,
                                offset = %enriched.message.offset,
                                "commit failed; leaving the rest of the batch for the next poll"
                            );
                            break;
                        }
                    }
                }
                ParsedItem::Rejected { span, reason } => {
                    warn!(offset = %span, %reason, "skipping rejected record");
                    self.sink_writer.skip(span).await?;
                }
            }
        }

        Ok(processed)
    }
}
