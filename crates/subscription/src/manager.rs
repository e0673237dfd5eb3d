//! SubscriptionManager - feed connection state machine

use std::convert::Infallible;
use std::future::Future;
use std::time::Duration;

use contracts::InboundMessage;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::connector::{FeedConnector, FeedSession};
use crate::error::{FeedError, HandlerError, SubscriptionError};
use crate::state::FeedState;

/// Owns the feed subscription and its reconnect policy
///
/// Loops `Disconnected -> Connecting -> Connected` forever. Any connection
/// failure, including loss of an established session, returns to
/// `Disconnected` and waits `reconnect_delay` before the next attempt.
pub struct SubscriptionManager<C> {
    connector: C,
    reconnect_delay: Duration,
    state_tx: watch::Sender<FeedState>,
    sequence: u64,
}

impl<C: FeedConnector> SubscriptionManager<C> {
    /// Create a new manager
    pub fn new(connector: C, reconnect_delay: Duration) -> Self {
        let (state_tx, _) = watch::channel(FeedState::Disconnected);
        Self {
            connector,
            reconnect_delay,
            state_tx,
            sequence: 0,
        }
    }

    /// Observe state transitions
    pub fn state(&self) -> watch::Receiver<FeedState> {
        self.state_tx.subscribe()
    }

    /// Number of messages delivered so far
    pub fn delivered(&self) -> u64 {
        self.sequence
    }

    /// Run until the handler fails
    ///
    /// The handler is awaited before the next message is read, so messages
    /// reach it in feed-delivery order. Feed failures never end the loop.
    ///
    /// # Errors
    /// Only `SubscriptionError::Handler`.
    #[instrument(name = "subscription_run", skip(self, handler))]
    pub async fn run<H, Fut, E>(&mut self, mut handler: H) -> Result<Infallible, SubscriptionError>
    where
        H: FnMut(InboundMessage) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Into<HandlerError>,
    {
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;
            self.transition(FeedState::Connecting);
            observability::record_feed_connect_attempt();

            match self.connector.connect().await {
                Ok(mut session) => {
                    info!(attempt, "Feed connected and subscribed");
                    self.transition(FeedState::Connected);
                    attempt = 0;

                    let lost = self.consume(&mut session, &mut handler).await?;
                    session.close().await;
                    observability::record_feed_connection_lost();
                    warn!(error = %lost, "Feed connection lost");
                }
                Err(e) => {
                    observability::record_feed_connect_failure();
                    warn!(
                        attempt,
                        error = %e,
                        retry_in_ms = self.reconnect_delay.as_millis() as u64,
                        "Feed connect failed"
                    );
                }
            }

            self.transition(FeedState::Disconnected);
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    /// Deliver messages until the session fails
    ///
    /// Returns the feed error that ended the session.
    async fn consume<S, H, Fut, E>(
        &mut self,
        session: &mut S,
        handler: &mut H,
    ) -> Result<FeedError, SubscriptionError>
    where
        S: FeedSession,
        H: FnMut(InboundMessage) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Into<HandlerError>,
    {
        loop {
            let message = match session.next_message().await {
                Ok(message) => message,
                Err(e) => return Ok(e),
            };

            self.sequence += 1;
            let message = message.with_sequence(self.sequence);
            let topic = message.topic().to_string();
            let sequence = message.sequence();

            debug!(
                topic = %topic,
                sequence,
                bytes = message.payload().len(),
                "Message received"
            );
            observability::record_feed_message(message.payload().len());

            if let Err(e) = handler(message).await {
                return Err(SubscriptionError::Handler {
                    topic,
                    sequence,
                    source: e.into(),
                });
            }
        }
    }

    fn transition(&self, next: FeedState) {
        let previous = self.state_tx.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "Feed state transition");
        }
        observability::record_feed_state(next == FeedState::Connected);
    }
}
