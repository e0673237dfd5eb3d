//! Subscription error types

use std::time::Duration;

use thiserror::Error;

/// Error returned by a message handler
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Feed connection failures. Always retried by the manager.
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    /// Broker unreachable (refused, DNS, TLS, IO)
    #[error("failed to connect to broker: {message}")]
    ConnectFailed { message: String },

    /// Broker answered CONNACK with a failure code
    #[error("broker rejected connection: {code}")]
    Rejected { code: String },

    /// CONNACK or SUBACK not received within the connect timeout
    #[error("handshake not complete within {after:?}")]
    Timeout { after: Duration },

    /// Subscription request failed or was refused
    #[error("subscription to '{topic}' failed: {message}")]
    Subscribe { topic: String, message: String },

    /// Established connection dropped
    #[error("connection lost: {message}")]
    ConnectionLost { message: String },
}

impl FeedError {
    /// Create a connect failure
    pub fn connect_failed(message: impl Into<String>) -> Self {
        Self::ConnectFailed {
            message: message.into(),
        }
    }

    /// Create a connection-lost error
    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::ConnectionLost {
            message: message.into(),
        }
    }
}

/// Errors that end `SubscriptionManager::run`
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// The message handler failed; treated as a broken invariant
    #[error("message handler failed on '{topic}' (sequence {sequence}): {source}")]
    Handler {
        topic: String,
        sequence: u64,
        #[source]
        source: HandlerError,
    },
}
