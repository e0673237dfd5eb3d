//! BridgeConfig - Config Loader output
//!
//! Resolved connection parameters for the feed and every sink. Read-only for
//! the lifetime of the process.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::SensitiveString;

/// Fixed relational table every row is written to
pub const RELATIONAL_TABLE: &str = "mqtt_data";

/// Values applied when a setting is omitted, from a file or the environment
pub mod defaults {
    pub const MQTT_PORT: u16 = 1883;
    pub const KEEP_ALIVE_SECS: u16 = 60;
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;
    pub const RECONNECT_DELAY_MS: u64 = 5000;
    pub const REDIS_PORT: u16 = 6379;
    /// Backend connect and request timeout
    pub const TIMEOUT_MS: u64 = 5000;
    pub const QUEUE_CAPACITY: usize = 16;
    pub const WRITE_TIMEOUT_MS: u64 = 10_000;
}

/// Complete bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BridgeConfig {
    /// Feed (MQTT broker) settings
    #[validate(nested)]
    pub feed: FeedConfig,

    /// Key-value cache sink
    #[validate(nested)]
    pub cache: CacheConfig,

    /// Document store sink
    #[validate(nested)]
    pub document_store: DocumentStoreConfig,

    /// Relational store sink
    #[validate(nested)]
    pub relational_store: RelationalStoreConfig,

    /// Push notification gateway sink
    #[validate(nested)]
    pub push_gateway: PushGatewayConfig,

    /// Fan-out tuning
    #[serde(default)]
    #[validate(nested)]
    pub dispatch: DispatchConfig,
}

/// MQTT QoS levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QoS {
    /// At most once delivery
    #[default]
    AtMostOnce,
    /// At least once delivery
    AtLeastOnce,
    /// Exactly once delivery
    ExactlyOnce,
}

impl QoS {
    /// Convert to u8 QoS level
    pub fn as_u8(&self) -> u8 {
        match self {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }

    /// Parse a numeric QoS level
    pub fn from_u8(level: u8) -> Option<Self> {
        match level {
            0 => Some(QoS::AtMostOnce),
            1 => Some(QoS::AtLeastOnce),
            2 => Some(QoS::ExactlyOnce),
            _ => None,
        }
    }
}

/// Feed subscription settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FeedConfig {
    /// Broker host name or address
    #[validate(length(min = 1))]
    pub host: String,

    /// Broker port
    #[serde(default = "default_mqtt_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Topic filter (`+` and `#` wildcards allowed)
    #[validate(length(min = 1))]
    pub topic: String,

    /// Client identifier (generated from the process id when absent)
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<SensitiveString>,

    /// Subscription QoS
    #[serde(default)]
    pub qos: QoS,

    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive_secs")]
    #[validate(range(min = 5))]
    pub keep_alive_secs: u16,

    /// Time allowed for CONNACK after opening the connection
    #[serde(default = "default_connect_timeout_secs")]
    #[validate(range(min = 1))]
    pub connect_timeout_secs: u64,

    /// Fixed wait between a failed or lost connection and the next attempt
    #[serde(default = "default_reconnect_delay_ms")]
    #[validate(range(min = 100))]
    pub reconnect_delay_ms: u64,
}

fn default_mqtt_port() -> u16 {
    defaults::MQTT_PORT
}

fn default_keep_alive_secs() -> u16 {
    defaults::KEEP_ALIVE_SECS
}

fn default_connect_timeout_secs() -> u64 {
    defaults::CONNECT_TIMEOUT_SECS
}

fn default_reconnect_delay_ms() -> u64 {
    defaults::RECONNECT_DELAY_MS
}

impl FeedConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(u64::from(self.keep_alive_secs))
    }

    /// Configured client id, or `mqtt-bridge-<pid>`
    pub fn client_id(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| format!("mqtt-bridge-{}", std::process::id()))
    }
}

/// Key-value cache settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CacheConfig {
    #[validate(length(min = 1))]
    pub host: String,

    #[serde(default = "default_redis_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Logical database index
    #[serde(default)]
    #[validate(range(min = 0))]
    pub db: i64,

    #[serde(default)]
    pub password: Option<SensitiveString>,

    /// Single key overwritten by every message
    #[validate(length(min = 1))]
    pub key: String,

    /// Connect and command timeout
    #[serde(default = "default_timeout_ms")]
    #[validate(range(min = 1))]
    pub timeout_ms: u64,
}

fn default_redis_port() -> u16 {
    defaults::REDIS_PORT
}

fn default_timeout_ms() -> u64 {
    defaults::TIMEOUT_MS
}

impl CacheConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Document store settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DocumentStoreConfig {
    /// Connection string (`mongodb://...`)
    #[validate(length(min = 1))]
    pub uri: String,

    #[validate(length(min = 1))]
    pub database: String,

    #[validate(length(min = 1))]
    pub collection: String,

    #[serde(default = "default_timeout_ms")]
    #[validate(range(min = 1))]
    pub server_selection_timeout_ms: u64,
}

impl DocumentStoreConfig {
    pub fn server_selection_timeout(&self) -> Duration {
        Duration::from_millis(self.server_selection_timeout_ms)
    }
}

/// Relational store settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RelationalStoreConfig {
    /// Connection URI (`postgres://...`)
    #[validate(length(min = 1))]
    pub uri: String,

    #[serde(default = "default_timeout_ms")]
    #[validate(range(min = 1))]
    pub connect_timeout_ms: u64,
}

impl RelationalStoreConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Push gateway settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PushGatewayConfig {
    /// HTTP API endpoint
    #[validate(length(min = 1))]
    pub endpoint: String,

    /// Sent as `Authorization: apikey <key>`
    pub api_key: SensitiveString,

    #[serde(default = "default_timeout_ms")]
    #[validate(range(min = 1))]
    pub timeout_ms: u64,
}

impl PushGatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Dispatcher tuning
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DispatchConfig {
    /// Queue capacity of each sink worker
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// Upper bound for a single sink write
    #[serde(default = "default_write_timeout_ms")]
    #[validate(range(min = 1))]
    pub write_timeout_ms: u64,
}

fn default_queue_capacity() -> usize {
    defaults::QUEUE_CAPACITY
}

fn default_write_timeout_ms() -> u64 {
    defaults::WRITE_TIMEOUT_MS
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

impl DispatchConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}
