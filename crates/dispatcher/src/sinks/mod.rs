//! Sink implementations
//!
//! Contains CacheSink, DocumentStoreSink, RelationalStoreSink and
//! PushGatewaySink.

mod cache;
mod document;
mod push_gateway;
mod relational;

pub use self::cache::CacheSink;
pub use self::document::{DocumentCollection, DocumentStoreSink, MongoCollection};
pub use self::push_gateway::PushGatewaySink;
pub use self::relational::{
    MemoryBackend, PostgresBackend, RelationalBackend, RelationalConnection, RelationalStoreSink,
};
