//! CacheSink - latest payload in a single Redis key

use std::time::Duration;

use contracts::{CacheConfig, DataSink, InboundMessage, SinkError};
use redis::aio::MultiplexedConnection;
use redis::{
    AsyncCommands, AsyncConnectionConfig, Client, ConnectionAddr, ConnectionInfo,
    RedisConnectionInfo, RedisError,
};
use tracing::{debug, instrument};

/// Sink that overwrites one configured key with each payload
///
/// The connection is opened on first use and reused; it is discarded after
/// any connection-level failure so the next write reconnects.
pub struct CacheSink {
    name: String,
    client: Client,
    key: String,
    timeout: Duration,
    conn: Option<MultiplexedConnection>,
}

impl CacheSink {
    /// Create a new CacheSink without connecting
    pub fn new(name: impl Into<String>, config: &CacheConfig) -> Result<Self, SinkError> {
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
            redis: RedisConnectionInfo {
                db: config.db,
                password: config.password.as_ref().map(|p| p.expose().to_string()),
                ..Default::default()
            },
        };
        let client = Client::open(info).map_err(|e| SinkError::connection_failed(e.to_string()))?;

        Ok(Self {
            name: name.into(),
            client,
            key: config.key.clone(),
            timeout: config.timeout(),
            conn: None,
        })
    }

    /// Key every message is written to
    pub fn key(&self) -> &str {
        &self.key
    }

    async fn connection(&mut self) -> Result<&mut MultiplexedConnection, SinkError> {
        if self.conn.is_none() {
            let config = AsyncConnectionConfig::new()
                .set_connection_timeout(self.timeout)
                .set_response_timeout(self.timeout);
            let conn = self
                .client
                .get_multiplexed_async_connection_with_config(&config)
                .await
                .map_err(|e| SinkError::connection_failed(e.to_string()))?;
            debug!(sink = %self.name, "Cache connection opened");
            self.conn = Some(conn);
        }
        self.conn
            .as_mut()
            .ok_or_else(|| SinkError::connection_failed("no connection"))
    }
}

/// Split Redis failures into unreachable backend vs rejected command
fn classify(e: &RedisError) -> SinkError {
    if e.is_io_error() || e.is_timeout() || e.is_connection_refusal() || e.is_connection_dropped()
    {
        SinkError::connection_failed(e.to_string())
    } else {
        SinkError::write_failed(e.to_string())
    }
}

impl DataSink for CacheSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "cache_sink_write",
        skip(self, message),
        fields(sink = %self.name, key = %self.key, topic = %message.topic())
    )]
    async fn write(&mut self, message: &InboundMessage) -> Result<(), SinkError> {
        let key = self.key.clone();
        let conn = self.connection().await?;

        let result = conn.set::<_, _, ()>(key, message.payload().as_ref()).await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                let error = classify(&e);
                if matches!(error, SinkError::ConnectionFailed { .. }) {
                    self.conn = None;
                }
                Err(error)
            }
        }
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.conn = None;
        debug!(sink = %self.name, "CacheSink closed");
        Ok(())
    }
}
