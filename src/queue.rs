//! Per-connection task queue.
//!
//! Each connection owns one bounded channel of [`ScanTask`] values consumed
//! by a single worker, so path tasks for a connection execute strictly in
//! order while different connections proceed independently.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::traits::{ScanError, SiteExtractor};

/// How many tasks a connection may have queued before the line reader is
/// back-pressured.
pub const TASK_QUEUE_DEPTH: usize = 1024;

/// One unit of work for a connection's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTask {
    /// A file path to scan.
    Path(String),
    /// End of the path stream: close the write side and stop consuming.
    /// The producer must not enqueue anything after this.
    EndOfStream,
}

/// Creates the task channel for one connection.
pub fn task_channel() -> (mpsc::Sender<ScanTask>, mpsc::Receiver<ScanTask>) {
    mpsc::channel(TASK_QUEUE_DEPTH)
}

/// Consumes a connection's task queue.
///
/// For each path task: scan, serialize the records as a single JSON-array
/// line, write it to the connection, and only then advance to the next task.
/// The end-of-stream task shuts down the write half and stops consumption.
///
/// A scan, serialization, or write fault aborts the current task and is
/// surfaced to the connection owner; this function does not retry.
pub async fn run_worker<E, W>(
    extractor: Arc<E>,
    mut tasks: mpsc::Receiver<ScanTask>,
    mut writer: W,
) -> Result<(), ScanError>
where
    E: SiteExtractor + ?Sized,
    W: AsyncWrite + Unpin,
{
    while let Some(task) = tasks.recv().await {
        match task {
            ScanTask::Path(path) => {
                let records = extractor.scan(&path).await?;
                debug!(path = %path, records = records.len(), "scan complete");

                let payload = serde_json::to_string(&records)?;
                writer.write_all(payload.as_bytes()).await?;
                writer.write_all(b"\r\n").await?;
                writer.flush().await?;
            }
            ScanTask::EndOfStream => {
                debug!("end of path stream, closing write side");
                writer.shutdown().await?;
                break;
            }
        }
    }
    Ok(())
}
