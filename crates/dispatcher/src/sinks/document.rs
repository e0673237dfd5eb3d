//! DocumentStoreSink - one MongoDB document per message

use contracts::{DataSink, DocumentStoreConfig, InboundMessage, SinkError};
use mongodb::bson::{doc, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use tracing::{debug, instrument};

const APP_NAME: &str = "mqtt-bridge";

/// Target collection of the document store
#[trait_variant::make(DocumentCollection: Send)]
pub trait LocalDocumentCollection {
    /// Insert one document
    async fn insert_document(&self, document: Document) -> Result<(), SinkError>;

    /// Release pooled connections
    async fn shutdown(&self);
}

/// Pooled MongoDB client bound to one collection
///
/// The driver reconnects on its own between writes.
pub struct MongoCollection {
    client: Client,
    collection: Collection<Document>,
}

impl MongoCollection {
    /// Build the pooled client
    ///
    /// Parsing a `mongodb+srv` URI performs a DNS lookup; no server is
    /// contacted otherwise.
    pub async fn open(config: &DocumentStoreConfig) -> Result<Self, SinkError> {
        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| SinkError::connection_failed(e.to_string()))?;
        options.app_name = Some(APP_NAME.to_string());
        options.server_selection_timeout = Some(config.server_selection_timeout());
        options.connect_timeout = Some(config.server_selection_timeout());

        let client =
            Client::with_options(options).map_err(|e| SinkError::connection_failed(e.to_string()))?;
        let collection = client
            .database(&config.database)
            .collection::<Document>(&config.collection);

        Ok(Self { client, collection })
    }
}

impl DocumentCollection for MongoCollection {
    async fn insert_document(&self, document: Document) -> Result<(), SinkError> {
        let result = self
            .collection
            .insert_one(document)
            .await
            .map_err(|e| SinkError::write_failed(e.to_string()))?;
        debug!(id = %result.inserted_id, "Document inserted");
        Ok(())
    }

    async fn shutdown(&self) {
        self.client.clone().shutdown().await;
    }
}

/// Sink that inserts `{topic, message}` documents
pub struct DocumentStoreSink<C = MongoCollection> {
    name: String,
    collection: C,
}

impl DocumentStoreSink<MongoCollection> {
    #[instrument(name = "document_sink_connect", skip(name, config), fields(database = %config.database, collection = %config.collection))]
    pub async fn connect(
        name: impl Into<String>,
        config: &DocumentStoreConfig,
    ) -> Result<Self, SinkError> {
        let collection = MongoCollection::open(config).await?;
        Ok(Self::new(name, collection))
    }
}

impl<C: DocumentCollection> DocumentStoreSink<C> {
    pub fn new(name: impl Into<String>, collection: C) -> Self {
        Self {
            name: name.into(),
            collection,
        }
    }
}

/// Document stored for one message
fn document_for(message: &InboundMessage) -> Document {
    doc! {
        "topic": message.topic(),
        "message": message.payload_text().as_ref(),
    }
}

impl<C: DocumentCollection + Send + Sync> DataSink for DocumentStoreSink<C> {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "document_sink_write",
        skip(self, message),
        fields(sink = %self.name, topic = %message.topic())
    )]
    async fn write(&mut self, message: &InboundMessage) -> Result<(), SinkError> {
        DocumentCollection::insert_document(&self.collection, document_for(message)).await
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        DocumentCollection::shutdown(&self.collection).await;
        debug!(sink = %self.name, "DocumentStoreSink closed");
        Ok(())
    }
}
