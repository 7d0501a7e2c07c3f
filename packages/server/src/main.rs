//! KnowledgeTree server binary
//!
//! Opens the tree store, starts the background sync scheduler and serves the
//! HTTP API until the process is stopped.
//!
//! # Environment Variables
//!
//! - `KT_PORT`: Server port (default: 5001)
//! - `KT_STORE`: `turso` (default) or `memory`
//! - `KT_DATABASE_PATH`: libsql database file
//! - `KT_UPLOAD_DIR`: Directory uploaded files are stored in
//! - `KT_SETTINGS_PATH`: JSON file holding the saved sync intervals
//! - `FRESHSERVICE_*`, `DATTO_*`: Upstream credentials, see `knowledgetree-sync`
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")
//!
//! A `.env` file in the working directory is loaded first if present.

use std::sync::Arc;

use knowledgetree_core::{MemoryStore, NodeService, TreeStore, TursoStore};
use knowledgetree_server::config::load_intervals;
use knowledgetree_server::{serve, AppState, ServerConfig, StoreKind};
use knowledgetree_sync::{SettingsHandle, SyncJobs, SyncScheduler, SyncSettings};

async fn open_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn TreeStore>> {
    let store: Arc<dyn TreeStore> = match config.store {
        StoreKind::Turso => {
            if let Some(parent) = config.database_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tracing::info!("Database: {}", config.database_path.display());
            Arc::new(TursoStore::new(config.database_path.clone()).await?)
        }
        StoreKind::Memory => {
            tracing::warn!("Using the in-memory store, nothing will be persisted");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!("Port: {}", config.port);

    let store = open_store(&config).await?;
    let nodes = NodeService::new(store.clone());
    nodes.ensure_root().await?;

    let mut sync_settings = SyncSettings::from_env();
    if let Some(intervals) = load_intervals(&config.settings_path).await? {
        tracing::info!("Loaded sync intervals from {}", config.settings_path.display());
        sync_settings.intervals = intervals;
    }
    tracing::info!(
        freshservice = sync_settings.freshservice_configured(),
        datto = sync_settings.datto_configured(),
        "Upstream credentials"
    );
    let settings = SettingsHandle::new(sync_settings);

    let scheduler = SyncScheduler::start(
        Arc::new(SyncJobs::new(nodes, settings.clone())),
        settings.clone(),
    );

    let state = AppState::new(store, scheduler.runner().clone(), settings, &config);
    let result = serve(state, config.port).await;

    scheduler.shutdown().await;
    result
}
