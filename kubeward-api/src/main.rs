use std::sync::Arc;

use kubeward_api::config::KubewardConfig;
use kubeward_api::kubernetes::client::KubeConnector;
use kubeward_api::kubernetes::KubernetesManager;
use kubeward_api::{db, logging, routes, shutdown, AppState};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = KubewardConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    let _log_guard = logging::init(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        return Err(anyhow::anyhow!("Invalid configuration: {}", e));
    }
    info!("Configuration loaded successfully");

    // Initialize database
    let database = db::Database::new(&config.database.url, config.database.max_connections)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    database
        .migrate()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
    info!("Database initialized");

    let kubernetes = KubernetesManager::new(
        database.pool().clone(),
        Arc::new(KubeConnector::new()),
        &config.kubernetes,
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, database, kubernetes));
    let app = routes::build_router(state.clone());

    // Set up graceful shutdown
    let coordinator = shutdown::ShutdownCoordinator::new();
    let signals = coordinator.clone();
    tokio::spawn(async move { signals.wait_for_signal().await });

    let listener = TcpListener::bind(&addr).await?;
    info!("Kubeward API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(coordinator.signal())
        .await?;

    info!("Server stopped, running cleanup...");
    let cleanup_state = state.clone();
    coordinator
        .cleanup(async move {
            cleanup_state.kubernetes.shutdown().await;
            cleanup_state.database.clone().close().await;
        })
        .await;

    info!("Cleanup complete, exiting");
    Ok(())
}
