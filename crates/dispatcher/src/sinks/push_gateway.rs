//! PushGatewaySink - Centrifugo HTTP publish

use contracts::{DataSink, InboundMessage, PushGatewayConfig, SensitiveString, SinkError};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, instrument};

/// Sink that publishes each message to the channel named by its topic
pub struct PushGatewaySink {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    api_key: SensitiveString,
}

impl PushGatewaySink {
    /// Create a new PushGatewaySink
    pub fn new(name: impl Into<String>, config: &PushGatewayConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SinkError::connection_failed(e.to_string()))?;

        Ok(Self {
            name: name.into(),
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

/// Publish command body
fn publish_body(message: &InboundMessage) -> Value {
    json!({
        "method": "publish",
        "params": {
            "channel": message.topic(),
            "data": message.payload_text(),
        }
    })
}

impl DataSink for PushGatewaySink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "push_gateway_sink_write",
        skip(self, message),
        fields(sink = %self.name, channel = %message.topic())
    )]
    async fn write(&mut self, message: &InboundMessage) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("apikey {}", self.api_key.expose()))
            .json(&publish_body(message))
            .send()
            .await
            .map_err(|e| SinkError::connection_failed(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::OK {
            debug!(sink = %self.name, "Published");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SinkError::publish_rejected(status.as_u16(), body))
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}
