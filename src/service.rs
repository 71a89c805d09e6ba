//! Network-facing extraction service.
//!
//! Accepts connections, reads newline-delimited file paths, and streams one
//! JSON-array result line per path back over the same connection. The first
//! empty line on a connection ends its input; the connection closes after the
//! final write.

use std::future::Future;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::queue::{run_worker, task_channel, ScanTask};
use crate::traits::{FileSiteExtractor, ScanError, SiteExtractor};

/// Long-lived socket service serving static-analysis requests.
pub struct ExtractionService {
    listen_addr: String,
    max_connections: usize,
}

impl ExtractionService {
    pub fn new(listen_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            max_connections: 64,
        }
    }

    /// Bounds how many connections are served concurrently. Work within one
    /// connection stays strictly serialized regardless of this value.
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Binds the listener and accepts connections until a ctrl-c signal.
    ///
    /// Shutdown is graceful: the signal stops the accept loop, and in-flight
    /// connections are drained to completion before this returns.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        info!(addr = %self.listen_addr, "accepting connections");

        let extractor: Arc<dyn SiteExtractor> = Arc::new(FileSiteExtractor);
        self.serve(listener, extractor, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
    }

    /// Accepts connections on `listener` until `shutdown` resolves, then
    /// stops accepting and waits for every in-flight connection to finish.
    pub async fn serve(
        &self,
        listener: TcpListener,
        extractor: Arc<dyn SiteExtractor>,
        shutdown: impl Future<Output = ()>,
    ) -> std::io::Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.max_connections));
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    info!(peer = %peer, "client connected");

                    let semaphore = Arc::clone(&semaphore);
                    let extractor = Arc::clone(&extractor);
                    connections.spawn(async move {
                        let _permit = match semaphore.acquire_owned().await {
                            Ok(permit) => permit,
                            Err(_) => return,
                        };
                        match serve_connection(stream, extractor).await {
                            Ok(()) => info!(peer = %peer, "connection closed"),
                            Err(err) => {
                                warn!(peer = %peer, error = %err, "connection terminated")
                            }
                        }
                    });
                }
                // Reap finished connection tasks so the set stays small.
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                () = &mut shutdown => {
                    info!("shutdown signal received, listener closed");
                    break;
                }
            }
        }

        drop(listener);
        if !connections.is_empty() {
            info!(connections = connections.len(), "draining in-flight connections");
        }
        while connections.join_next().await.is_some() {}
        Ok(())
    }
}

/// Serves one connection: a line reader feeding the connection's task queue,
/// and the queue worker writing result lines back.
///
/// Every non-empty trimmed line is a path task. The first empty line enqueues
/// the end-of-stream task and stops reading; nothing is ever enqueued after
/// it. Faults from the worker terminate the connection and are returned to
/// the caller.
pub async fn serve_connection<S>(
    stream: S,
    extractor: Arc<dyn SiteExtractor>,
) -> Result<(), ScanError>
where
    S: AsyncRead + AsyncWrite,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let (tx, rx) = task_channel();

    let reader = async move {
        let mut lines = BufReader::new(read_half).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let path = line.trim();
                    if path.is_empty() {
                        debug!("end of input signaled");
                        let _ = tx.send(ScanTask::EndOfStream).await;
                        return;
                    }
                    debug!(path = %path, "queueing path");
                    if tx.send(ScanTask::Path(path.to_string())).await.is_err() {
                        // Worker is gone; the connection owner already has
                        // the fault.
                        return;
                    }
                }
                Ok(None) => return,
                Err(err) => {
                    warn!(error = %err, "read error on connection");
                    return;
                }
            }
        }
    };

    let worker = run_worker(extractor, rx, write_half);
    tokio::pin!(reader);
    tokio::pin!(worker);

    // The worker resolving means the connection is done: either the stream
    // was drained cleanly or a fault terminated it. Do not wait for further
    // client input in the fault case, the reader is simply dropped.
    tokio::select! {
        result = &mut worker => result,
        () = &mut reader => worker.await,
    }
}
