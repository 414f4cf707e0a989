use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ampel_core::config::PipelineConfig;
use ampel_mqtt::client::{BrokerClient, BrokerConfig};
use ampel_mqtt::manager::ConnectionManager;
use ampel_mqtt::reconnect::ReconnectConfig;
use ampel_pipeline::{
    AggregationWorker, DisabledPersistence, IngressQueue, PersistenceGateway, SqlPersistence,
    StateStore,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ampel_api::config::ServerConfig;
use ampel_api::router::build_app_router;
use ampel_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ampel_api=debug,ampel_mqtt=info,ampel_pipeline=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let pipeline = PipelineConfig::from_env().expect("Invalid pipeline configuration");
    tracing::info!(
        nodes = ?pipeline.node_ids(),
        history_capacity = pipeline.history_capacity,
        series_capacity = pipeline.series_capacity,
        rate_window = pipeline.rate_window,
        queue_capacity = pipeline.queue_capacity,
        "Loaded pipeline configuration",
    );

    let broker = BrokerConfig::from_env();

    // --- Database (optional) ---
    let pool = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = ampel_db::create_pool(&database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            ampel_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");
            Some(pool)
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set, measurements will not be persisted");
            None
        }
    };

    let gateway: Arc<dyn PersistenceGateway> = match &pool {
        Some(pool) => Arc::new(SqlPersistence::new(pool.clone())),
        None => Arc::new(DisabledPersistence),
    };

    // --- Pipeline ---
    let cancel = CancellationToken::new();
    let store = Arc::new(StateStore::new(&pipeline));
    let queue = Arc::new(IngressQueue::new(pipeline.queue_capacity));

    let worker = AggregationWorker::new(&pipeline, Arc::clone(&store), gateway);
    let worker_handle = tokio::spawn(worker.run(Arc::clone(&queue), cancel.child_token()));

    let connection = ConnectionManager::start(
        BrokerClient::new(broker, pipeline.topics()),
        Arc::clone(&queue),
        ReconnectConfig::default(),
        cancel.child_token(),
    );
    tracing::info!("Pipeline started");

    // --- App state ---
    let state = AppState {
        store,
        queue,
        broker_state: connection.state(),
        pool,
        pipeline: Arc::new(pipeline),
        config: Arc::new(config.clone()),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    connection.shutdown().await;

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), worker_handle).await;
    tracing::info!("Aggregation worker stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
