//! InboundMessage - Subscription Manager output
//!
//! One message delivered by the feed.

use std::borrow::Cow;

use bytes::Bytes;

/// A message received from the feed.
///
/// Immutable once built. Cloning is cheap: the payload is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    topic: String,
    payload: Bytes,
    sequence: u64,
}

impl InboundMessage {
    /// Create a message with sequence number 0
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            sequence: 0,
        }
    }

    /// Attach the delivery sequence number (log correlation only)
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Topic the message was published on
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Raw payload bytes
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Delivery sequence number assigned by the subscription manager
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Payload as text. Invalid UTF-8 sequences are replaced with U+FFFD.
    pub fn payload_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}
