//! SinkHandle - one sink behind an isolated queue and worker task

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument};

use contracts::{DataSink, InboundMessage, SinkError};

use crate::metrics::SinkMetrics;

/// One queued write and the channel its outcome goes back on
struct WriteRequest {
    message: InboundMessage,
    reply: oneshot::Sender<Result<(), SinkError>>,
}

/// Handle to a running sink worker
pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<WriteRequest>,
    metrics: Arc<SinkMetrics>,
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Create a new SinkHandle and spawn the worker task
    ///
    /// Every write is abandoned after `write_timeout`.
    pub fn spawn<S: DataSink + Send + 'static>(
        sink: S,
        queue_capacity: usize,
        write_timeout: Duration,
    ) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name, write_timeout).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue a message for this sink
    ///
    /// Waits for queue capacity, then returns without waiting for the write.
    /// A dead worker yields an already-failed `PendingWrite`.
    pub async fn submit(&self, message: InboundMessage) -> PendingWrite {
        let (reply, outcome) = oneshot::channel();
        let request = WriteRequest { message, reply };

        if self.tx.send(request).await.is_err() {
            error!(sink = %self.name, "Sink worker closed unexpectedly");
            return PendingWrite::failed(SinkError::unavailable("sink worker stopped"));
        }

        self.metrics
            .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
        PendingWrite {
            outcome: Ok(outcome),
        }
    }

    /// Queue a message and wait for its outcome
    pub async fn write(&self, message: InboundMessage) -> Result<(), SinkError> {
        self.submit(message).await.outcome().await
    }

    /// Shutdown the sink worker gracefully
    ///
    /// Queued writes are completed before the sink is closed.
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        // Drop sender to signal worker to stop
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

/// A write accepted by a sink worker
pub struct PendingWrite {
    outcome: Result<oneshot::Receiver<Result<(), SinkError>>, SinkError>,
}

impl PendingWrite {
    fn failed(error: SinkError) -> Self {
        Self {
            outcome: Err(error),
        }
    }

    /// Wait for the sink's outcome
    pub async fn outcome(self) -> Result<(), SinkError> {
        match self.outcome {
            Ok(rx) => rx
                .await
                .unwrap_or_else(|_| Err(SinkError::unavailable("sink worker dropped the write"))),
            Err(e) => Err(e),
        }
    }
}

/// Worker task that consumes write requests and writes to the sink
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics, write_timeout),
    fields(sink = %name)
)]
async fn sink_worker<S: DataSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<WriteRequest>,
    metrics: Arc<SinkMetrics>,
    name: String,
    write_timeout: Duration,
) {
    debug!(sink = %name, "Sink worker started");

    while let Some(request) = rx.recv().await {
        metrics.set_queue_len(rx.len());
        observability::record_sink_queue_depth(&name, rx.len());

        let started = Instant::now();
        let outcome = match tokio::time::timeout(write_timeout, sink.write(&request.message)).await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                metrics.inc_timeout_count();
                Err(SinkError::connection_failed("write timed out"))
            }
        };
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &outcome {
            Ok(()) => {
                metrics.inc_write_count();
                observability::record_sink_write(&name, "ok", latency_ms);
            }
            Err(e) => {
                metrics.inc_failure_count();
                observability::record_sink_write(&name, e.kind(), latency_ms);
            }
        }

        // Receiver gone means the dispatch was cancelled; nothing to report to
        if request.reply.send(outcome).is_err() {
            debug!(sink = %name, "Write outcome discarded");
        }
    }

    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}
