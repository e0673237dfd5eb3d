//! Feed connection states

use std::fmt;

/// Connection lifecycle of the feed subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedState {
    /// No connection; waiting out the backoff or not started
    #[default]
    Disconnected,
    /// Connect attempt in flight
    Connecting,
    /// Subscribed and receiving messages
    Connected,
}

impl FeedState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedState::Disconnected => "disconnected",
            FeedState::Connecting => "connecting",
            FeedState::Connected => "connected",
        }
    }
}

impl fmt::Display for FeedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
