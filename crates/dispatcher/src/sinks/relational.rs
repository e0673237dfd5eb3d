//! RelationalStoreSink - one row per message, one connection per write

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use contracts::{DataSink, InboundMessage, RelationalStoreConfig, SinkError, RELATIONAL_TABLE};
use tokio::task::JoinHandle;
use tokio_postgres::NoTls;
use tracing::{debug, instrument, warn};

/// Parameterised insert into the fixed table
fn insert_sql() -> String {
    format!("INSERT INTO {RELATIONAL_TABLE} (topic, message) VALUES ($1, $2)")
}

/// Opens scoped connections to the relational store
#[trait_variant::make(RelationalBackend: Send)]
pub trait LocalRelationalBackend {
    type Connection: RelationalConnection + Send;

    /// Open a fresh connection
    async fn connect(&self) -> Result<Self::Connection, SinkError>;
}

/// A single open connection
#[trait_variant::make(RelationalConnection: Send)]
pub trait LocalRelationalConnection {
    /// Insert one row inside its own transaction
    ///
    /// Rolls back before returning an error.
    async fn insert_row(&mut self, topic: &str, message: &str) -> Result<(), SinkError>;

    /// Release the connection
    async fn close(&mut self);
}

/// Sink that inserts `(topic, message)` rows
///
/// Connect, insert and commit per message. The connection is closed on every
/// path, including failures.
pub struct RelationalStoreSink<B> {
    name: String,
    backend: B,
}

impl<B: RelationalBackend> RelationalStoreSink<B> {
    pub fn new(name: impl Into<String>, backend: B) -> Self {
        Self {
            name: name.into(),
            backend,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: RelationalBackend + Send + Sync> DataSink for RelationalStoreSink<B> {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "relational_sink_write",
        skip(self, message),
        fields(sink = %self.name, topic = %message.topic())
    )]
    async fn write(&mut self, message: &InboundMessage) -> Result<(), SinkError> {
        let mut conn = self.backend.connect().await?;
        let text = message.payload_text();
        let result = RelationalConnection::insert_row(&mut conn, message.topic(), &text).await;
        RelationalConnection::close(&mut conn).await;
        result
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        debug!(sink = %self.name, "RelationalStoreSink closed");
        Ok(())
    }
}

/// PostgreSQL backend
pub struct PostgresBackend {
    config: tokio_postgres::Config,
    connect_timeout: Duration,
}

impl PostgresBackend {
    /// Parse the connection URI without connecting
    pub fn new(config: &RelationalStoreConfig) -> Result<Self, SinkError> {
        let mut pg = tokio_postgres::Config::from_str(&config.uri)
            .map_err(|e| SinkError::write_failed(format!("invalid connection uri: {e}")))?;
        pg.connect_timeout(config.connect_timeout());

        Ok(Self {
            config: pg,
            connect_timeout: config.connect_timeout(),
        })
    }
}

impl RelationalBackend for PostgresBackend {
    type Connection = PostgresConnection;

    async fn connect(&self) -> Result<PostgresConnection, SinkError> {
        let (client, connection) =
            tokio::time::timeout(self.connect_timeout, self.config.connect(NoTls))
                .await
                .map_err(|_| SinkError::write_failed("connect timed out"))?
                .map_err(|e| SinkError::write_failed(e.to_string()))?;

        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "Relational connection error");
            }
        });

        Ok(PostgresConnection {
            client: Some(client),
            driver: Some(driver),
        })
    }
}

/// Open PostgreSQL connection and its driver task
pub struct PostgresConnection {
    client: Option<tokio_postgres::Client>,
    driver: Option<JoinHandle<()>>,
}

impl RelationalConnection for PostgresConnection {
    async fn insert_row(&mut self, topic: &str, message: &str) -> Result<(), SinkError> {
        let client = self
            .client
            .as_mut()
            .ok_or_else(|| SinkError::write_failed("connection closed"))?;

        let tx = client
            .transaction()
            .await
            .map_err(|e| SinkError::write_failed(e.to_string()))?;

        if let Err(e) = tx.execute(insert_sql().as_str(), &[&topic, &message]).await {
            if let Err(rollback) = tx.rollback().await {
                debug!(error = %rollback, "Rollback failed");
            }
            return Err(SinkError::write_failed(e.to_string()));
        }

        tx.commit()
            .await
            .map_err(|e| SinkError::write_failed(e.to_string()))
    }

    async fn close(&mut self) {
        // Dropping the client ends the driver task
        self.client = None;
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.await {
                debug!(error = %e, "Relational driver task failed");
            }
        }
    }
}

/// Failure injected by `MemoryBackend`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Connect,
    Insert,
    Commit,
}

/// In-memory relational backend
///
/// Records committed rows and tracks open connections.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    rows: Arc<Mutex<Vec<(String, String)>>>,
    opened: Arc<AtomicUsize>,
    open: Arc<AtomicUsize>,
    failure: Option<Failure>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every connect attempt fails
    pub fn unreachable() -> Self {
        Self {
            failure: Some(Failure::Connect),
            ..Self::default()
        }
    }

    /// Connects succeed, every insert fails and rolls back
    pub fn rejecting_inserts() -> Self {
        Self {
            failure: Some(Failure::Insert),
            ..Self::default()
        }
    }

    /// Inserts succeed, every commit fails
    pub fn rejecting_commits() -> Self {
        Self {
            failure: Some(Failure::Commit),
            ..Self::default()
        }
    }

    /// Committed rows, in commit order
    pub fn rows(&self) -> Vec<(String, String)> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    /// Connections opened so far
    pub fn connections_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Connections currently open
    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

impl RelationalBackend for MemoryBackend {
    type Connection = MemoryConnection;

    async fn connect(&self) -> Result<MemoryConnection, SinkError> {
        if self.failure == Some(Failure::Connect) {
            return Err(SinkError::write_failed("connection refused"));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryConnection {
            backend: self.clone(),
            closed: false,
        })
    }
}

/// Connection handed out by `MemoryBackend`
pub struct MemoryConnection {
    backend: MemoryBackend,
    closed: bool,
}

impl RelationalConnection for MemoryConnection {
    async fn insert_row(&mut self, topic: &str, message: &str) -> Result<(), SinkError> {
        match self.backend.failure {
            Some(Failure::Insert) => return Err(SinkError::write_failed("insert rejected")),
            Some(Failure::Commit) => return Err(SinkError::write_failed("commit failed")),
            _ => {}
        }
        self.backend
            .rows
            .lock()
            .map_err(|_| SinkError::write_failed("row store poisoned"))?
            .push((topic.to_string(), message.to_string()));
        Ok(())
    }

    async fn close(&mut self) {
        self.release();
    }
}

impl MemoryConnection {
    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.backend.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

// A write cancelled mid-flight drops the connection without closing it
impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.release();
    }
}
