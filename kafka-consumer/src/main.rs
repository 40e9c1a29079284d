use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use kafka_consumer::config::Config;
use kafka_consumer::service::{router, serve, spawn_consumer, AppState, LoggingProcessor};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Kafka consumer service");

    let config = Config::init_with_defaults()
        .context("Failed to load configuration from environment variables. Please check your environment setup.")?;

    info!("Configuration loaded: {:?}", config);

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install prometheus recorder")?;

    let shutdown = CancellationToken::new();
    let (stats, consumer_task) = spawn_consumer(
        &config,
        Box::new(LoggingProcessor::default()),
        shutdown.clone(),
    )?;

    let app = router(AppState {
        stats,
        metrics: Some(metrics),
    });
    let bind = config.bind_address();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = serve(app, &bind).await {
            error!("Failed to serve HTTP endpoints on {bind}: {e}");
        }
    });
    info!("Started HTTP server on {}", config.bind_address());

    let mut consumer_task = consumer_task;
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for ctrl+c signal")?;
            info!("Received shutdown signal, shutting down gracefully...");
        }
        finished = &mut consumer_task => {
            // the consumer gave up on its own
            server_handle.abort();
            let summary = finished.context("Consumer task panicked")??;
            info!(?summary, "Consumer stopped");
            return Ok(());
        }
    }

    shutdown.cancel();

    match tokio::time::timeout(config.shutdown_timeout(), consumer_task).await {
        Ok(joined) => {
            let summary = joined.context("Consumer task panicked")??;
            info!(?summary, "Consumer stopped");
        }
        Err(_) => {
            warn!(
                "Consumer shutdown timed out after {:?}",
                config.shutdown_timeout()
            );
        }
    }

    server_handle.abort();

    Ok(())
}
