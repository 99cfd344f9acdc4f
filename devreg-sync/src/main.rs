use devreg_sync::config::Config;
use devreg_sync::logging;
use devreg_sync::module::openfda::OpenFdaClient;
use devreg_sync::module::pipeline::{Pipeline, RunOptions};
use devreg_sync::module::store::DeviceStore;

use anyhow::{Context, Result};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load_from_env()?;

    // Initialize logging
    let _logging_guard = logging::init_logging(&config.log_dir, "devreg-sync", &config.log_level)?;

    tracing::info!("devreg-sync starting...");

    if let Err(e) = run(&config).await {
        tracing::error!("Device sync failed: {:#}", e);
        return Err(e);
    }

    Ok(())
}

async fn run(config: &Config) -> Result<()> {
    let store = DeviceStore::open(&config.store.database_path)
        .with_context(|| format!("Failed to open device store {:?}", config.store.database_path))?;
    tracing::info!("Using device store {:?}", config.store.database_path);

    let client = OpenFdaClient::new(&config.api).context("Failed to create openFDA client")?;
    let pipeline = Pipeline::new(Arc::new(client), Arc::new(store), config.pipeline.clone());

    let report = pipeline
        .run(&RunOptions {
            export_path: config.export.path.clone(),
            preview_approved: true,
        })
        .await?;

    tracing::info!(
        "Done: {} PMA and {} 510k records fetched, {} devices stored, {} exported",
        report.pma.fetched,
        report.k510.fetched,
        report.total_stored,
        report.export.map(|e| e.count()).unwrap_or(0)
    );

    Ok(())
}
