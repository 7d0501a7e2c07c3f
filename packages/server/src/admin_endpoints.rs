//! Admin endpoints
//!
//! - `GET /api/admin/export` - Export user-authored nodes
//! - `POST /api/admin/import` - Import an export
//! - `POST /api/admin/reinitialize_db` - Wipe the tree back to a bare root
//! - `GET /api/admin/settings` - Sync intervals and which upstreams are configured
//! - `POST /api/admin/settings` - Save sync intervals
//! - `POST /api/admin/run_job/:job` - Start a sync job in the background

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use knowledgetree_core::{ExportRecord, ImportReport};
use knowledgetree_sync::{JobKind, SyncIntervals};
use serde::Serialize;

use crate::config::save_intervals;
use crate::{AppState, HttpError};

async fn export_tree(State(state): State<AppState>) -> Result<Json<Vec<ExportRecord>>, HttpError> {
    Ok(Json(state.transfer.export().await?))
}

async fn import_tree(
    State(state): State<AppState>,
    Json(records): Json<Vec<ExportRecord>>,
) -> Result<Json<ImportReport>, HttpError> {
    let _guard = state.write_lock.lock().await;
    Ok(Json(state.transfer.import(records).await?))
}

#[derive(Debug, Serialize)]
pub struct ReinitializeResponse {
    pub success: bool,
    pub removed: u64,
}

async fn reinitialize_db(
    State(state): State<AppState>,
) -> Result<Json<ReinitializeResponse>, HttpError> {
    let _guard = state.write_lock.lock().await;
    let removed = state.nodes.reinitialize().await?;
    Ok(Json(ReinitializeResponse {
        success: true,
        removed,
    }))
}

#[derive(Debug, Serialize)]
pub struct SettingsView {
    #[serde(flatten)]
    pub intervals: SyncIntervals,
    pub freshservice_configured: bool,
    pub datto_configured: bool,
}

async fn settings_view(state: &AppState) -> SettingsView {
    let settings = state.settings.snapshot().await;
    SettingsView {
        intervals: settings.intervals,
        freshservice_configured: settings.freshservice_configured(),
        datto_configured: settings.datto_configured(),
    }
}

async fn get_settings(State(state): State<AppState>) -> Json<SettingsView> {
    Json(settings_view(&state).await)
}

async fn save_settings(
    State(state): State<AppState>,
    Json(intervals): Json<SyncIntervals>,
) -> Result<Json<SettingsView>, HttpError> {
    save_intervals(state.settings_path.as_path(), &intervals).await?;
    state.settings.set_intervals(intervals).await;
    Ok(Json(settings_view(&state).await))
}

#[derive(Debug, Serialize)]
pub struct RunJobResponse {
    pub started: bool,
    pub job: JobKind,
}

async fn run_job(
    State(state): State<AppState>,
    Path(job): Path<String>,
) -> Result<(StatusCode, Json<RunJobResponse>), HttpError> {
    let kind: JobKind = job.parse().map_err(HttpError::invalid_input)?;

    if !state.jobs.trigger(kind) {
        return Err(HttpError::new(
            format!("The {} sync is already running", kind),
            "JOB_RUNNING",
        ));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(RunJobResponse {
            started: true,
            job: kind,
        }),
    ))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/admin/export", get(export_tree))
        .route("/api/admin/import", post(import_tree))
        .route("/api/admin/reinitialize_db", post(reinitialize_db))
        .route("/api/admin/settings", get(get_settings).post(save_settings))
        .route("/api/admin/run_job/:job", post(run_job))
        .with_state(state)
}
