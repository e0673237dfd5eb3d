//! # Dispatcher
//!
//! Message fan-out module.
//!
//! Responsibilities:
//! - Deliver every `InboundMessage` to each configured sink
//! - Isolate sinks: one failing or slow sink never blocks the others
//! - Report exactly one `SinkResult` per sink, in configuration order

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{DataSink, InboundMessage, SinkError, SinkResult};
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder};
pub use error::DispatcherError;
pub use handle::{PendingWrite, SinkHandle};
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{
    CacheSink, DocumentCollection, DocumentStoreSink, MemoryBackend, MongoCollection,
    PostgresBackend, PushGatewaySink, RelationalBackend, RelationalConnection,
    RelationalStoreSink,
};
