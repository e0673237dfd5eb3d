//! # Contracts
//!
//! Frozen interface contracts shared by every bridge crate: the inbound message,
//! the sink capability and its outcome types, and the resolved configuration.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Message model
//! - One `InboundMessage` per feed delivery, immutable after construction
//! - One `SinkResult` per sink per message, consumed by logging and metrics

mod config;
mod error;
mod message;
mod secret;
mod sink;

pub use config::*;
pub use error::*;
pub use message::InboundMessage;
pub use secret::SensitiveString;
pub use sink::*;
