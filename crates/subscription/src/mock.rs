//! Scripted feed connector for tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use contracts::InboundMessage;
use tokio::time::Instant;

use crate::connector::{FeedConnector, FeedSession};
use crate::error::FeedError;

/// Outcome of one scripted connect attempt
#[derive(Debug, Clone)]
pub enum ScriptedConnect {
    Fail(String),
    Session(Vec<ScriptedEvent>),
}

impl ScriptedConnect {
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }

    pub fn session(events: Vec<ScriptedEvent>) -> Self {
        Self::Session(events)
    }

    /// Session delivering `messages` then staying idle
    pub fn messages(messages: Vec<InboundMessage>) -> Self {
        Self::Session(messages.into_iter().map(ScriptedEvent::Message).collect())
    }
}

/// Event produced by a scripted session
#[derive(Debug, Clone)]
pub enum ScriptedEvent {
    /// Deliver a message
    Message(InboundMessage),
    /// Drop the connection with this reason
    Drop(String),
}

/// Shared record of connect attempt instants
#[derive(Debug, Clone, Default)]
pub struct ConnectAttempts(Arc<Mutex<Vec<Instant>>>);

impl ConnectAttempts {
    pub fn count(&self) -> usize {
        self.0.lock().map(|times| times.len()).unwrap_or(0)
    }

    pub fn times(&self) -> Vec<Instant> {
        self.0.lock().map(|times| times.clone()).unwrap_or_default()
    }

    fn record(&self) {
        if let Ok(mut times) = self.0.lock() {
            times.push(Instant::now());
        }
    }
}

/// Connector that replays a fixed script
///
/// Once the script is exhausted `connect` never completes, which keeps the
/// manager parked instead of spinning through retries.
#[derive(Debug)]
pub struct MockConnector {
    script: VecDeque<ScriptedConnect>,
    attempts: ConnectAttempts,
}

impl MockConnector {
    pub fn new(script: Vec<ScriptedConnect>) -> Self {
        Self {
            script: script.into(),
            attempts: ConnectAttempts::default(),
        }
    }

    /// Handle to inspect connect attempts after the connector is moved
    pub fn attempts(&self) -> ConnectAttempts {
        self.attempts.clone()
    }
}

impl FeedConnector for MockConnector {
    type Session = MockSession;

    async fn connect(&mut self) -> Result<MockSession, FeedError> {
        self.attempts.record();

        match self.script.pop_front() {
            Some(ScriptedConnect::Fail(message)) => Err(FeedError::connect_failed(message)),
            Some(ScriptedConnect::Session(events)) => Ok(MockSession {
                events: events.into(),
                closed: false,
            }),
            None => std::future::pending().await,
        }
    }
}

/// Session that replays scripted events
#[derive(Debug)]
pub struct MockSession {
    events: VecDeque<ScriptedEvent>,
    closed: bool,
}

impl MockSession {
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl FeedSession for MockSession {
    async fn next_message(&mut self) -> Result<InboundMessage, FeedError> {
        if self.closed {
            return Err(FeedError::connection_lost("session closed"));
        }
        match self.events.pop_front() {
            Some(ScriptedEvent::Message(message)) => Ok(message),
            Some(ScriptedEvent::Drop(reason)) => Err(FeedError::connection_lost(reason)),
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}
