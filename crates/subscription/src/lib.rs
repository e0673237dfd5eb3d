//! # Subscription
//!
//! Feed subscription module.
//!
//! Responsibilities:
//! - Own the long-lived connection to the MQTT broker
//! - Drive the `Disconnected -> Connecting -> Connected` state machine
//! - Retry forever with a fixed backoff, never exit on feed failure
//! - Hand each delivered message to the handler in delivery order
//!
//! ## Usage Example
//!
//! ```ignore
//! use subscription::{MqttConnector, SubscriptionManager};
//!
//! let connector = MqttConnector::new(config.feed.clone());
//! let mut manager = SubscriptionManager::new(connector, config.feed.reconnect_delay());
//! manager
//!     .run(|msg| async move {
//!         let results = dispatcher.dispatch(msg).await;
//!         Ok::<_, std::convert::Infallible>(())
//!     })
//!     .await?;
//! ```
//!
//! ## Mock Testing
//!
//! ```ignore
//! use subscription::{MockConnector, ScriptedConnect};
//!
//! let connector = MockConnector::new(vec![
//!     ScriptedConnect::fail("refused"),
//!     ScriptedConnect::session(vec![msg]),
//! ]);
//! ```

mod connector;
mod error;
mod manager;
mod mock;
mod mqtt;
mod state;

// Re-exports
pub use connector::{FeedConnector, FeedSession};
pub use contracts::InboundMessage;
pub use error::{FeedError, HandlerError, SubscriptionError};
pub use manager::SubscriptionManager;
pub use mock::{ConnectAttempts, MockConnector, MockSession, ScriptedConnect, ScriptedEvent};
pub use mqtt::{MqttConnector, MqttSession};
pub use state::FeedState;
