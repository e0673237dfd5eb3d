//! Dispatcher - fan-out of one message to every sink

use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use contracts::{BridgeConfig, InboundMessage, SinkResult};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{
    CacheSink, DocumentStoreSink, PostgresBackend, PushGatewaySink, RelationalStoreSink,
};

/// Sink names, in dispatch order
pub const CACHE_SINK: &str = "cache";
pub const DOCUMENT_STORE_SINK: &str = "document_store";
pub const RELATIONAL_STORE_SINK: &str = "relational_store";
pub const PUSH_GATEWAY_SINK: &str = "push_gateway";

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder<'a> {
    config: &'a BridgeConfig,
}

impl<'a> DispatcherBuilder<'a> {
    /// Use the sink sections of a bridge configuration
    pub fn from_config(config: &'a BridgeConfig) -> Self {
        Self { config }
    }

    /// Build every sink and start its worker
    ///
    /// Sinks are built in fixed order: cache, document store, relational
    /// store, push gateway. No backend is contacted here except for DNS
    /// resolution of `mongodb+srv` URIs.
    #[instrument(name = "dispatcher_builder_build", skip(self))]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let config = self.config;
        let capacity = config.dispatch.queue_capacity;
        let timeout = config.dispatch.write_timeout();

        let cache = CacheSink::new(CACHE_SINK, &config.cache)
            .map_err(|e| DispatcherError::sink_creation(CACHE_SINK, e.to_string()))?;

        let document = DocumentStoreSink::connect(DOCUMENT_STORE_SINK, &config.document_store)
            .await
            .map_err(|e| DispatcherError::sink_creation(DOCUMENT_STORE_SINK, e.to_string()))?;

        let backend = PostgresBackend::new(&config.relational_store)
            .map_err(|e| DispatcherError::sink_creation(RELATIONAL_STORE_SINK, e.to_string()))?;
        let relational = RelationalStoreSink::new(RELATIONAL_STORE_SINK, backend);

        let push = PushGatewaySink::new(PUSH_GATEWAY_SINK, &config.push_gateway)
            .map_err(|e| DispatcherError::sink_creation(PUSH_GATEWAY_SINK, e.to_string()))?;

        let handles = vec![
            SinkHandle::spawn(cache, capacity, timeout),
            SinkHandle::spawn(document, capacity, timeout),
            SinkHandle::spawn(relational, capacity, timeout),
            SinkHandle::spawn(push, capacity, timeout),
        ];

        info!(sinks = handles.len(), "Dispatcher sinks started");
        Ok(Dispatcher::with_handles(handles))
    }
}

/// Fans messages out to an ordered set of sinks
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
}

impl Dispatcher {
    /// Create a dispatcher with custom sink handles
    pub fn with_handles(handles: Vec<SinkHandle>) -> Self {
        Self { handles }
    }

    /// Sink names in dispatch order
    pub fn sink_names(&self) -> Vec<&str> {
        self.handles.iter().map(SinkHandle::name).collect()
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Deliver one message to every sink
    ///
    /// Every sink is attempted regardless of the others' outcomes, and the
    /// writes run concurrently. Returns exactly one result per sink, in sink
    /// order. Never fails as a whole.
    #[instrument(
        name = "dispatcher_dispatch",
        skip(self, message),
        fields(topic = %message.topic(), sequence = message.sequence())
    )]
    pub async fn dispatch(&self, message: InboundMessage) -> Vec<SinkResult> {
        let started = Instant::now();

        // Enqueue on every worker first so the writes overlap
        let mut pending = Vec::with_capacity(self.handles.len());
        for handle in &self.handles {
            pending.push((handle.name(), handle.submit(message.clone()).await));
        }

        let mut results = Vec::with_capacity(pending.len());
        for (name, write) in pending {
            results.push(SinkResult {
                sink_name: name.to_string(),
                outcome: write.outcome().await,
            });
        }

        let failed = Self::log_results(&message, &results);
        observability::record_dispatch(failed, started.elapsed().as_secs_f64() * 1000.0);

        results
    }

    /// Log every outcome, returning the failure count
    fn log_results(message: &InboundMessage, results: &[SinkResult]) -> usize {
        let mut failed = 0;
        for result in results {
            match &result.outcome {
                Ok(()) => debug!(
                    sink = %result.sink_name,
                    topic = %message.topic(),
                    sequence = message.sequence(),
                    "Sink write succeeded"
                ),
                Err(e) => {
                    failed += 1;
                    warn!(
                        sink = %result.sink_name,
                        topic = %message.topic(),
                        sequence = message.sequence(),
                        kind = e.kind(),
                        error = %e,
                        "Sink write failed"
                    );
                }
            }
        }
        failed
    }

    /// Drain and close every sink
    #[instrument(name = "dispatcher_shutdown", skip(self))]
    pub async fn shutdown(self) {
        for handle in self.handles {
            handle.shutdown().await;
        }
        info!("Dispatcher shutdown complete");
    }
}

/// Convenience function to create a dispatcher from a bridge configuration
#[instrument(name = "dispatcher_create", skip(config))]
pub async fn create_dispatcher(config: &BridgeConfig) -> Result<Dispatcher, DispatcherError> {
    DispatcherBuilder::from_config(config).build().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DataSink, SinkError};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<(String, String)>>>;

    struct RecordingSink {
        name: String,
        log: Log,
        fail_with: Option<SinkError>,
        delay: Duration,
    }

    impl RecordingSink {
        fn ok(name: &str, log: &Log) -> Self {
            Self {
                name: name.to_string(),
                log: Arc::clone(log),
                fail_with: None,
                delay: Duration::ZERO,
            }
        }

        fn failing(name: &str, log: &Log, error: SinkError) -> Self {
            Self {
                fail_with: Some(error),
                ..Self::ok(name, log)
            }
        }
    }

    impl DataSink for RecordingSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, message: &InboundMessage) -> Result<(), SinkError> {
            tokio::time::sleep(self.delay).await;
            if let Some(e) = &self.fail_with {
                return Err(e.clone());
            }
            self.log
                .lock()
                .unwrap()
                .push((self.name.clone(), message.payload_text().into_owned()));
            Ok(())
        }

        async fn close(&mut self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    fn spawn<S: DataSink + Send + 'static>(sink: S) -> SinkHandle {
        SinkHandle::spawn(sink, 4, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_dispatch_fanout_all_ok() {
        let log = Log::default();
        let dispatcher = Dispatcher::with_handles(vec![
            spawn(RecordingSink::ok("a", &log)),
            spawn(RecordingSink::ok("b", &log)),
            spawn(RecordingSink::ok("c", &log)),
        ]);

        let results = dispatcher
            .dispatch(InboundMessage::new("sensors/temp", "22.5"))
            .await;

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(SinkResult::is_ok));
        let names: Vec<_> = results.iter().map(|r| r.sink_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(log.lock().unwrap().len(), 3);

        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_failure_does_not_block_other_sinks() {
        let log = Log::default();
        let dispatcher = Dispatcher::with_handles(vec![
            spawn(RecordingSink::failing(
                "cache",
                &log,
                SinkError::connection_failed("refused"),
            )),
            spawn(RecordingSink::ok("document_store", &log)),
            spawn(RecordingSink::failing(
                "push_gateway",
                &log,
                SinkError::publish_rejected(500, "boom"),
            )),
        ]);

        let results = dispatcher.dispatch(InboundMessage::new("t", "x")).await;

        assert_eq!(results.len(), 3);
        assert_eq!(
            results[0].error(),
            Some(&SinkError::connection_failed("refused"))
        );
        assert!(results[1].is_ok());
        assert_eq!(results[2].error().map(SinkError::kind), Some("publish_rejected"));
        assert_eq!(
            *log.lock().unwrap(),
            vec![("document_store".to_string(), "x".to_string())]
        );

        dispatcher.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sinks_run_concurrently() {
        let log = Log::default();
        let mut slow_a = RecordingSink::ok("a", &log);
        slow_a.delay = Duration::from_secs(3);
        let mut slow_b = RecordingSink::ok("b", &log);
        slow_b.delay = Duration::from_secs(3);

        let dispatcher = Dispatcher::with_handles(vec![spawn(slow_a), spawn(slow_b)]);

        let started = tokio::time::Instant::now();
        let results = dispatcher.dispatch(InboundMessage::new("t", "x")).await;

        assert!(results.iter().all(SinkResult::is_ok));
        assert!(started.elapsed() < Duration::from_secs(6));

        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_per_sink_order_follows_dispatch_order() {
        let log = Log::default();
        let dispatcher = Dispatcher::with_handles(vec![spawn(RecordingSink::ok("a", &log))]);

        for payload in ["1", "2", "3"] {
            dispatcher.dispatch(InboundMessage::new("t", payload)).await;
        }

        let payloads: Vec<_> = log.lock().unwrap().iter().map(|(_, p)| p.clone()).collect();
        assert_eq!(payloads, vec!["1", "2", "3"]);

        let metrics = dispatcher.metrics();
        assert_eq!(metrics[0].0, "a");
        assert_eq!(metrics[0].1.write_count, 3);

        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_empty_dispatcher_returns_no_results() {
        let dispatcher = Dispatcher::with_handles(Vec::new());
        assert!(dispatcher
            .dispatch(InboundMessage::new("t", "x"))
            .await
            .is_empty());
        assert!(dispatcher.sink_names().is_empty());
    }
}
