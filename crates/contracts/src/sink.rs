//! DataSink trait - Dispatcher output interface
//!
//! Defines the abstract sink capability, its typed error and the per-sink
//! outcome reported by the Dispatcher.

use thiserror::Error;

use crate::InboundMessage;

/// Data output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(DataSink: Send)]
pub trait LocalDataSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one message to the backend
    ///
    /// # Errors
    /// Returns the typed failure; the caller never retries.
    async fn write(&mut self, message: &InboundMessage) -> Result<(), SinkError>;

    /// Release any held connection
    async fn close(&mut self) -> Result<(), SinkError>;
}

/// Sink failure taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// Backend could not be reached (refused, timeout, dropped)
    #[error("connection failed: {reason}")]
    ConnectionFailed { reason: String },

    /// Backend reachable but the write or commit was rejected
    #[error("write failed: {reason}")]
    WriteFailed { reason: String },

    /// Push gateway answered with a non-200 status
    #[error("publish rejected with status {status}: {body}")]
    PublishRejected { status: u16, body: String },

    /// Sink worker is no longer running
    #[error("sink unavailable: {reason}")]
    Unavailable { reason: String },
}

impl SinkError {
    /// Create connection failure
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            reason: reason.into(),
        }
    }

    /// Create write failure
    pub fn write_failed(reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            reason: reason.into(),
        }
    }

    /// Create publish rejection
    pub fn publish_rejected(status: u16, body: impl Into<String>) -> Self {
        Self::PublishRejected {
            status,
            body: body.into(),
        }
    }

    /// Create unavailable error
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Stable label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionFailed { .. } => "connection_failed",
            Self::WriteFailed { .. } => "write_failed",
            Self::PublishRejected { .. } => "publish_rejected",
            Self::Unavailable { .. } => "unavailable",
        }
    }
}

/// Outcome of one sink invocation for one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkResult {
    /// Name of the sink that produced the outcome
    pub sink_name: String,

    /// Final outcome (never retried)
    pub outcome: Result<(), SinkError>,
}

impl SinkResult {
    /// Successful outcome
    pub fn ok(sink_name: impl Into<String>) -> Self {
        Self {
            sink_name: sink_name.into(),
            outcome: Ok(()),
        }
    }

    /// Failed outcome
    pub fn err(sink_name: impl Into<String>, error: SinkError) -> Self {
        Self {
            sink_name: sink_name.into(),
            outcome: Err(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The failure, if any
    pub fn error(&self) -> Option<&SinkError> {
        self.outcome.as_ref().err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_result_helpers() {
        let ok = SinkResult::ok("cache");
        assert!(ok.is_ok());
        assert!(ok.error().is_none());

        let err = SinkResult::err("push_gateway", SinkError::publish_rejected(503, "busy"));
        assert!(!err.is_ok());
        assert_eq!(err.error().map(SinkError::kind), Some("publish_rejected"));
    }

    #[test]
    fn test_sink_error_display() {
        let e = SinkError::connection_failed("refused");
        assert_eq!(e.to_string(), "connection failed: refused");

        let e = SinkError::publish_rejected(401, "invalid key");
        assert_eq!(e.to_string(), "publish rejected with status 401: invalid key");
    }
}
