//! KnowledgeTree HTTP server
//!
//! A JSON API over the knowledge tree plus the admin surface for the sync
//! jobs. Endpoints are grouped into modules that each contribute a router:
//! - `node_endpoints`: browsing and editing the tree
//! - `context_endpoints`: aggregated context and attachment summaries
//! - `file_endpoints`: uploads and serving stored files
//! - `admin_endpoints`: export/import, reinitialization, sync settings and jobs

use axum::{
    http::{header, Method},
    Router,
};
use knowledgetree_core::services::{ContextService, NodeService, PathResolver, TransferService};
use knowledgetree_core::TreeStore;
use knowledgetree_sync::{JobRunner, SettingsHandle};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;
mod http_error;

mod admin_endpoints;
mod context_endpoints;
mod file_endpoints;
mod node_endpoints;

pub use config::{ConfigError, ServerConfig, StoreKind};
pub use http_error::HttpError;

/// Application state shared across all endpoints
///
/// `write_lock` serializes tree writes coming in over HTTP so multi-step
/// operations (import, reinitialize) never interleave with single edits.
/// Reads do not take it.
#[derive(Clone)]
pub struct AppState {
    pub nodes: NodeService,
    pub paths: PathResolver,
    pub context: ContextService,
    pub transfer: TransferService,
    pub jobs: JobRunner,
    pub settings: SettingsHandle,
    pub upload_dir: Arc<PathBuf>,
    pub settings_path: Arc<PathBuf>,
    pub write_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn TreeStore>,
        jobs: JobRunner,
        settings: SettingsHandle,
        config: &ServerConfig,
    ) -> Self {
        let nodes = NodeService::new(store.clone());
        Self {
            paths: PathResolver::new(store.clone()),
            context: ContextService::new(store),
            transfer: TransferService::new(nodes.clone()),
            nodes,
            jobs,
            settings,
            upload_dir: Arc::new(config.upload_dir.clone()),
            settings_path: Arc::new(config.settings_path.clone()),
            write_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Create the application router with all endpoint modules
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(node_endpoints::routes(state.clone()))
        .merge(context_endpoints::routes(state.clone()))
        .merge(file_endpoints::routes(state.clone()))
        .merge(admin_endpoints::routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

/// Any origin unless `CORS_ALLOW_ORIGIN` pins one
fn cors_layer() -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    match std::env::var("CORS_ALLOW_ORIGIN")
        .ok()
        .and_then(|origin| origin.parse::<header::HeaderValue>().ok())
    {
        Some(origin) => layer.allow_origin(origin),
        None => layer.allow_origin(Any),
    }
}

/// Bind `port` on all interfaces and serve until Ctrl+C
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("KnowledgeTree listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
