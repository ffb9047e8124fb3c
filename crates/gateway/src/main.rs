//! Gateway entry point.

use std::sync::Arc;

use stock::{CompensationEngine, InMemoryEventSink, StockService};
use store::{InMemoryLedgerStore, InMemoryProductStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use gateway::{GatewayConfig, MessageHandler, QueueConsumer, QueuePublisher, RetryPolicy, connect};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics exporter
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .install()
        .expect("failed to install Prometheus recorder");

    let config = GatewayConfig::from_env();

    // 3. Wire the stock core. Persistence connection setup is owned by the
    // surrounding process; the standalone binary runs on in-memory stores.
    let products = InMemoryProductStore::new();
    let ledger = InMemoryLedgerStore::new();
    let events = Arc::new(InMemoryEventSink::new());

    let service = StockService::new(products.clone(), ledger.clone(), events.clone());
    let engine = CompensationEngine::new(products, ledger, events)
        .idempotent(config.rollback_idempotent);

    // 4. Connect to the broker with bounded retry; exhaustion is fatal.
    let connection = connect(&config.amqp_url, &RetryPolicy::default())
        .await
        .expect("broker connection failed");

    let publisher = QueuePublisher::new(&connection, &config.outbound_queue)
        .await
        .expect("failed to open outbound queue");
    let consumer = QueueConsumer::new(&connection, &config.inbound_queue)
        .await
        .expect("failed to open inbound queue");

    let handler = MessageHandler::new(service, engine, Arc::new(publisher));

    tracing::info!(
        inbound = %config.inbound_queue,
        outbound = %config.outbound_queue,
        "gateway started"
    );

    // 5. Run the delivery loop until shutdown
    tokio::select! {
        result = consumer.run(&handler) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "consumer loop failed");
            }
        }
        () = shutdown_signal() => {}
    }

    tracing::info!("gateway shut down gracefully");
}
