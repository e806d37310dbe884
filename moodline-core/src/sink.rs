//! Dual sink writer: commits one enriched record to the relational store and
//! the flat append log as a single logical unit, then advances the offset
//! store. The write order is fixed (relational first, flat log second,
//! offset last) so every crash point leaves the system in a state the next
//! poll can repair:
//!
//! - relational write fails: nothing else is touched, the record is re-read
//!   because the offset did not advance;
//! - flat append fails after the relational write: the offset did not
//!   advance, the replayed commit upserts the same relational key and
//!   re-appends the missing flat row;
//! - crash before the offset advance: both sinks hold the row, the replayed
//!   commit upserts the same key and the flat log skips the already-appended
//!   offset.

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::message::{EnrichedMessage, OffsetRange, SinkRow};
use crate::offset::OffsetStore;

/// SQLite-backed relational sink.
pub(crate) mod relational;

/// CSV append-log sink.
pub(crate) mod flatlog;

/// Relational half of the dual sink. The write must be idempotent per
/// offset: replaying a commit after a partial failure upserts the same key
/// instead of producing a duplicate row.
#[trait_variant::make(RelationalSink: Send)]
#[allow(dead_code)]
pub(crate) trait LocalRelationalSink {
    async fn upsert(&mut self, row: &SinkRow) -> Result<()>;

    /// Highest offset present in the store, None when empty.
    async fn max_offset(&mut self) -> Result<Option<u64>>;

    /// Rows with `after < offset <= up_to`, ordered by offset.
    async fn rows_in_range(&mut self, after: u64, up_to: u64) -> Result<Vec<SinkRow>>;
}

/// Append-log half of the dual sink. Rows arrive in commit order and are
/// never rewritten in place; an append whose offset is not beyond the last
/// appended row is a replay and must be skipped.
#[trait_variant::make(FlatSink: Send)]
#[allow(dead_code)]
pub(crate) trait LocalFlatSink {
    async fn append(&mut self, row: &SinkRow) -> Result<()>;

    /// Offset of the last appended row, None when the log is empty.
    async fn last_offset(&mut self) -> Result<Option<u64>>;
}

/// Owns both sinks and the offset store; the offset is mutated here and
/// nowhere else.
pub(crate) struct SinkWriter<R, F> {
    pub(crate) relational: R,
    pub(crate) flat: F,
    offset_store: OffsetStore,
}

impl<R, F> SinkWriter<R, F>
where
    R: RelationalSink,
    F: FlatSink,
{
    pub(crate) fn new(relational: R, flat: F, offset_store: OffsetStore) -> Self {
        SinkWriter {
            relational,
            flat,
            offset_store,
        }
    }

    pub(crate) fn committed_offset(&self) -> u64 {
        self.offset_store.current()
    }

    /// Commit one enriched record to both sinks and advance the offset.
    /// This is the only point at which the committed offset changes.
    pub(crate) async fn commit(&mut self, enriched: &EnrichedMessage) -> Result<()> {
        let row = SinkRow::from(enriched);
        self.relational.upsert(&row).await?;
        self.flat.append(&row).await?;
        self.offset_store.advance(row.offset).await
    }

    /// Advance the offset past a rejected record without touching either
    /// sink, so it is never retried and never appears downstream.
    pub(crate) async fn skip(&mut self, span: OffsetRange) -> Result<()> {
        self.offset_store.advance(span.end).await
    }

    /// Startup reconciliation of the two sinks against the offset store.
    ///
    /// The offset store is the source of truth for what has committed.
    /// Relational rows beyond the committed offset are residue of a commit
    /// that never finished and are left for the replay to overwrite. A flat
    /// log missing rows that the relational store holds at or below the
    /// committed offset gets a one-time repair append. A flat log that is
    /// ahead of the relational store cannot be explained by the write order
    /// and fails startup.
    pub(crate) async fn reconcile(&mut self) -> Result<()> {
        let committed = self.offset_store.current();
        let relational_max = self.relational.max_offset().await?;
        let flat_max = self.flat.last_offset().await?;

        if flat_max > relational_max {
            return Err(Error::Inconsistency(format!(
                "flat log ends at offset {:?} but the relational store ends at {:?}; \
                 refusing to run against diverged sinks",
                flat_max, relational_max
            )));
        }

        if relational_max.is_some_and(|max| max > committed) {
            debug!(
                ?relational_max,
                committed, "relational rows beyond the committed offset; replay will overwrite them"
            );
        }

        let repair_floor = flat_max.unwrap_or(0);
        if repair_floor < committed {
            let missing = self.relational.rows_in_range(repair_floor, committed).await?;
            if missing.is_empty() {
                return Ok(());
            }
            warn!(
                rows = missing.len(),
                from = repair_floor,
                to = committed,
                "flat log is behind the committed offset; repairing from the relational store"
            );
            for row in &missing {
                self.flat.append(row).await?;
            }
            info!(rows = missing.len(), "flat log repaired");
        }

        Ok(())
    }
}
