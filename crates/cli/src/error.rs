//! Error types for CLI operations.

use thiserror::Error;

/// Failures that stop the bridge
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration could not be loaded or validated
    #[error("Configuration error: {0}")]
    Config(#[from] contracts::ContractError),

    /// A sink could not be built at startup
    #[error("Failed to start dispatcher: {0}")]
    Dispatcher(#[from] dispatcher::DispatcherError),

    /// The message handler failed; the bridge cannot continue
    #[error("Subscription stopped: {0}")]
    Subscription(#[from] subscription::SubscriptionError),
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
