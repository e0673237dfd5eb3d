//! FeedConnector / FeedSession - feed transport abstraction
//!
//! Decouples the reconnect state machine from the concrete MQTT client so the
//! retry policy can be exercised without a broker.

use contracts::InboundMessage;

use crate::FeedError;

/// Opens subscribed sessions against the feed broker
#[trait_variant::make(FeedConnector: Send)]
pub trait LocalFeedConnector {
    /// Live subscription produced by a successful connect
    type Session: FeedSession + Send;

    /// Connect, authenticate and subscribe to the configured topic filter
    ///
    /// # Errors
    /// Any connection-level failure; the caller backs off and retries.
    async fn connect(&mut self) -> Result<Self::Session, FeedError>;
}

/// A connected, subscribed feed session
#[trait_variant::make(FeedSession: Send)]
pub trait LocalFeedSession {
    /// Wait for the next delivered message
    ///
    /// # Errors
    /// The connection is gone; the session must not be used again.
    async fn next_message(&mut self) -> Result<InboundMessage, FeedError>;

    /// Disconnect politely (best effort)
    async fn close(&mut self);
}
