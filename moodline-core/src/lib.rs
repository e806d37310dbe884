//! Moodline consumes JSON records appended to a live data file, enriches
//! each record with a sentiment classification, and durably records it into
//! a relational store and a flat append log without ever reprocessing a
//! committed record. The consume-a-batch cycle executes in an infinite loop
//! till a shutdown signal is received:
//! - Read the bytes appended past the committed offset
//! - Parse them into validated records, holding back a partial trailing line
//! - Score each record's text for sentiment
//! - Commit each enriched record to both sinks and advance the offset

use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::config;
use crate::error::Result;
use crate::forwarder::ForwarderBuilder;
use crate::offset::OffsetStore;
use crate::sink::SinkWriter;
use crate::sink::flatlog::CsvSink;
use crate::sink::relational::SqliteSink;
use crate::source::file::FileSource;

mod config;
pub mod error;
mod forwarder;
pub mod message;
mod offset;
mod sink;
mod source;
pub mod transformer;

/// Run the pipeline until a shutdown signal arrives or an invariant
/// violation stops it. Transient errors are retried forever by the loop
/// itself; an `Err` from here means the process must exit non-zero.
pub async fn run() -> Result<()> {
    let cln_token = CancellationToken::new();
    let shutdown_cln_token = cln_token.clone();

    // wait for SIG{INT,TERM} and invoke cancellation token.
    let shutdown_handle: JoinHandle<()> = tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_cln_token.cancel();
    });

    if let Err(e) = init(cln_token).await {
        error!("Pipeline error: {e:?}");

        // abort the signal handler task since we have an error and we are
        // shutting down
        if !shutdown_handle.is_finished() {
            shutdown_handle.abort();
        }
        return Err(e);
    }

    info!("Gracefully Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        info!("Received Ctrl+C signal");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
        info!("Received terminate signal");
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn init(cln_token: CancellationToken) -> Result<()> {
    let settings = config();

    for path in [
        &settings.sqlite_path,
        &settings.csv_path,
        &settings.offset_path,
    ] {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                error::Error::Config(format!(
                    "failed to create {}: {e}",
                    parent.display()
                ))
            })?;
        }
    }

    let offset_store = OffsetStore::load(&settings.offset_path).await?;
    let relational = SqliteSink::connect(&settings.sqlite_path).await?;
    let flat = CsvSink::open(&settings.csv_path)?;

    let mut sink_writer = SinkWriter::new(relational, flat, offset_store);
    // startup reconciliation: repair a lagging flat log, refuse diverged sinks
    sink_writer.reconcile().await?;

    let source = FileSource::new(settings.source_path.clone());

    let mut forwarder = ForwarderBuilder::new(source, sink_writer, cln_token)
        .poll_interval(settings.poll_interval)
        .batch_size(settings.batch_size)
        .build();

    // start the forwarder, it will return only on shutdown or an invariant
    // violation
    forwarder.start().await?;

    info!("Forwarder stopped gracefully");
    Ok(())
}
