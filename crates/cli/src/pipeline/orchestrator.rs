//! Bridge orchestrator - wires the subscription to the dispatcher.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Mutex;
use std::time::Instant;

use contracts::BridgeConfig;
use dispatcher::Dispatcher;
use subscription::{FeedConnector, MqttConnector, SubscriptionManager};
use tracing::{info, warn};

use super::BridgeStats;
use crate::error::Result;

/// Main bridge orchestrator
pub struct Bridge {
    config: BridgeConfig,
}

impl Bridge {
    /// Create a new bridge with the given configuration
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    /// Build the sinks, connect to the broker and forward until `shutdown`
    ///
    /// Returns early only when the message handler fails.
    pub async fn run<F>(self, shutdown: F) -> Result<BridgeStats>
    where
        F: Future<Output = ()>,
    {
        let dispatcher = dispatcher::create_dispatcher(&self.config).await?;
        info!(sinks = ?dispatcher.sink_names(), "Dispatcher started");

        let connector = MqttConnector::new(self.config.feed.clone());
        self.run_with(connector, dispatcher, shutdown).await
    }

    /// Forward messages from `connector` through `dispatcher`
    pub async fn run_with<C, F>(
        &self,
        connector: C,
        dispatcher: Dispatcher,
        shutdown: F,
    ) -> Result<BridgeStats>
    where
        C: FeedConnector,
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let mut manager = SubscriptionManager::new(connector, self.config.feed.reconnect_delay());
        let stats = Mutex::new(BridgeStats::default());

        let outcome = {
            let dispatcher = &dispatcher;
            let stats = &stats;

            let forward = manager.run(|message| async move {
                let started = Instant::now();
                let results = dispatcher.dispatch(message).await;
                if let Ok(mut stats) = stats.lock() {
                    stats.record(&results, started.elapsed());
                }
                Ok::<_, Infallible>(())
            });

            tokio::select! {
                result = forward => Some(result),
                _ = shutdown => None,
            }
        };

        info!("Shutting down dispatcher...");
        dispatcher.shutdown().await;

        let mut final_stats = stats.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
        final_stats.duration = start_time.elapsed();

        match outcome {
            Some(Err(e)) => {
                warn!(error = %e, "Subscription stopped");
                Err(e.into())
            }
            Some(Ok(never)) => match never {},
            None => Ok(final_stats),
        }
    }
}
