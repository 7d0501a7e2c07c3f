//! File endpoints
//!
//! - `POST /api/upload/:id` - Multipart upload (field `file`) attached to a node
//! - `GET /uploads/:node_id/:filename` - Serve a stored file
//!
//! Files live in one directory per node, so equal filenames on different
//! nodes never overwrite each other.

use axum::{
    extract::{Multipart, Path, State},
    response::Json,
    routing::post,
    Router,
};
use serde::Serialize;
use tower_http::services::ServeDir;

use crate::{AppState, HttpError};

const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
    pub url: String,
}

/// Reduce a client-supplied filename to its final path component
///
/// Both separators are honoured since browsers on Windows may send full
/// paths. Returns `None` for names that would escape the upload directory.
pub fn stored_filename(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    match name {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

async fn upload_file(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, HttpError> {
    // Node ids double as directory names
    if stored_filename(&node_id).as_deref() != Some(node_id.as_str()) {
        return Err(HttpError::invalid_input("Invalid node id"));
    }

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| HttpError::invalid_input(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .and_then(stored_filename)
            .ok_or_else(|| HttpError::invalid_input("No file selected"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| HttpError::invalid_input(format!("Failed to read upload: {}", e)))?;

        // Held from the existence check to the file record so a concurrent
        // delete cannot leave the stored bytes without an owner
        let _guard = state.write_lock.lock().await;
        state.nodes.get_node(&node_id).await?;

        let dir = state.upload_dir.join(&node_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(HttpError::internal)?;
        tokio::fs::write(dir.join(&filename), &bytes)
            .await
            .map_err(HttpError::internal)?;
        state.nodes.add_file(&node_id, &filename).await?;
        tracing::info!(
            node_id = %node_id,
            filename = %filename,
            size = bytes.len(),
            "stored upload"
        );

        return Ok(Json(UploadResponse {
            success: true,
            url: format!("/uploads/{}/{}", node_id, filename),
            filename,
        }));
    }

    // Unknown nodes are still reported as such when the body has no file
    state.nodes.get_node(&node_id).await?;
    Err(HttpError::invalid_input("No file part"))
}

pub fn routes(state: AppState) -> Router {
    let uploads = ServeDir::new(state.upload_dir.as_path());
    Router::new()
        .route("/api/upload/:id", post(upload_file))
        .nest_service("/uploads", uploads)
        .with_state(state)
}
