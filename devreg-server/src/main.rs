use anyhow::Context;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use devreg_sync::config::Config;
use devreg_sync::logging;
use devreg_sync::module::openfda::OpenFdaClient;
use devreg_sync::module::pipeline::Pipeline;
use devreg_sync::module::store::DeviceStore;

mod routes;
use routes::AppState;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received.");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let mut config = Config::load_from_env()?;

    // Initialize logging
    let _logging_guard = logging::init_logging(&config.log_dir, "devreg-server", &config.log_level)?;

    if let Err(e) = config.apply_port_override(std::env::var("PORT").ok().as_deref()) {
        tracing::warn!("{}", e);
    }

    // Store handle lives as long as the server
    let store = DeviceStore::open(&config.store.database_path)
        .with_context(|| format!("Failed to open device store {:?}", config.store.database_path))?;
    store.ensure_schema().context("Failed to ensure device schema")?;
    info!("Using device store {:?}", config.store.database_path);

    let client = OpenFdaClient::new(&config.api).context("Failed to create openFDA client")?;
    let pipeline = Pipeline::new(Arc::new(client), Arc::new(store), config.pipeline.clone());
    let state = Arc::new(AppState::new(pipeline, config.export.directory.clone()));

    // Build the application routes
    let app = routes::router(state)
        .layer(TraceLayer::new_for_http());

    // Bind to address
    let addr = config.server_address();
    info!("Starting device sync server on http://{}", addr);
    info!("Exports are written to {:?}", config.export.directory);

    // Start the server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
