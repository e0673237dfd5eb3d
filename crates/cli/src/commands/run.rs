//! `run` command implementation.

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::cli::RunArgs;
use crate::commands::load_config;
use crate::pipeline::Bridge;

/// Execute the `run` command
pub async fn run_bridge(args: &RunArgs) -> Result<()> {
    let (config, source) =
        load_config(args.config.as_deref()).context("Failed to load configuration")?;

    info!(
        source = source.as_str(),
        broker = %format!("{}:{}", config.feed.host, config.feed.port),
        topic = %config.feed.topic,
        qos = config.feed.qos.as_u8(),
        cache_key = %config.cache.key,
        collection = %format!("{}.{}", config.document_store.database, config.document_store.collection),
        push_endpoint = %config.push_gateway.endpoint,
        "Configuration loaded"
    );

    let bridge = Bridge::new(config);

    info!("Starting bridge...");
    let stats = bridge
        .run(setup_shutdown_signal())
        .await
        .context("Bridge stopped with an error")?;

    info!(
        messages = stats.messages,
        sink_failures = stats.total_failures(),
        duration_secs = stats.duration.as_secs_f64(),
        "Bridge stopped"
    );
    stats.print_summary();

    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed is logged and never fires.
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    warn!("Received shutdown signal, stopping bridge...");
}
