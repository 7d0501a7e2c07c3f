//! Tree browsing and editing endpoints
//!
//! - `GET /api/health` - Health check
//! - `GET /api/nodes/:parent_id` - Children of a folder
//! - `GET /api/path/:node_id` - Breadcrumb from the root
//! - `GET /api/resolve?path=A/b` - Node at a name path
//! - `GET /api/node/:id` - Node with rendered HTML and files
//! - `POST /api/node` - Create a node
//! - `PUT /api/node/:id` - Update a node
//! - `DELETE /api/node/:id` - Delete a node and its subtree

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use knowledgetree_core::services::parse_path;
use knowledgetree_core::utils::render_html;
use knowledgetree_core::{FileRecord, Node, NodeUpdate, PathSegment, ROOT_ID};
use serde::{Deserialize, Serialize};

use crate::{AppState, HttpError};

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
}

async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Folder listing entry
#[derive(Debug, Serialize)]
pub struct ChildSummary {
    pub id: String,
    pub name: String,
    pub is_folder: bool,
    pub is_attached: bool,
    pub read_only: bool,
}

impl From<Node> for ChildSummary {
    fn from(node: Node) -> Self {
        Self {
            id: node.id,
            name: node.name,
            is_folder: node.is_folder,
            is_attached: node.is_attached,
            read_only: node.read_only,
        }
    }
}

async fn get_children(
    State(state): State<AppState>,
    Path(parent_id): Path<String>,
) -> Result<Json<Vec<ChildSummary>>, HttpError> {
    let children = state.nodes.get_children(&parent_id).await?;
    Ok(Json(children.into_iter().map(ChildSummary::from).collect()))
}

async fn get_breadcrumb(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> Result<Json<Vec<PathSegment>>, HttpError> {
    Ok(Json(state.paths.get_breadcrumb(&node_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub path: String,
}

async fn resolve_path(
    State(state): State<AppState>,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<Node>, HttpError> {
    let names = parse_path(&query.path);
    Ok(Json(state.paths.resolve_node(&names).await?))
}

/// A node as the article view needs it
#[derive(Debug, Serialize)]
pub struct NodeView {
    #[serde(flatten)]
    pub node: Node,
    pub content_html: String,
    pub files: Vec<FileRecord>,
}

async fn get_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<NodeView>, HttpError> {
    let node = state.nodes.get_node(&id).await?;
    let files = state.nodes.get_files(&id).await?;
    Ok(Json(NodeView {
        content_html: render_html(&node.content),
        node,
        files,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateNodeInput {
    #[serde(default)]
    pub parent_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default)]
    pub is_attached: bool,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateNodeResponse {
    pub success: bool,
    pub id: String,
    pub name: String,
    pub is_folder: bool,
    pub is_attached: bool,
}

async fn create_node(
    State(state): State<AppState>,
    Json(input): Json<CreateNodeInput>,
) -> Result<(StatusCode, Json<CreateNodeResponse>), HttpError> {
    let parent_id = input.parent_id.as_deref().unwrap_or(ROOT_ID);
    let mut node = Node::new(parent_id, input.name, input.is_folder, input.is_attached);
    if let Some(content) = input.content {
        node = node.with_content(content);
    }

    let _guard = state.write_lock.lock().await;
    let created = state.nodes.create_node(node).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateNodeResponse {
            success: true,
            id: created.id,
            name: created.name,
            is_folder: created.is_folder,
            is_attached: created.is_attached,
        }),
    ))
}

/// Partial update; absent fields are left alone
#[derive(Debug, Default, Deserialize)]
pub struct UpdateNodeInput {
    pub name: Option<String>,
    pub content: Option<String>,
    pub is_folder: Option<bool>,
    pub is_attached: Option<bool>,
}

impl From<UpdateNodeInput> for NodeUpdate {
    fn from(input: UpdateNodeInput) -> Self {
        let mut update = NodeUpdate::new();
        if let Some(name) = input.name {
            update = update.with_name(name);
        }
        if let Some(content) = input.content {
            update = update.with_content(content);
        }
        if let Some(is_folder) = input.is_folder {
            update = update.with_is_folder(is_folder);
        }
        if let Some(is_attached) = input.is_attached {
            update = update.with_is_attached(is_attached);
        }
        update
    }
}

async fn update_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateNodeInput>,
) -> Result<Json<Node>, HttpError> {
    let update = NodeUpdate::from(input);
    if update.is_empty() {
        return Ok(Json(state.nodes.get_node(&id).await?));
    }

    let _guard = state.write_lock.lock().await;
    Ok(Json(state.nodes.update(&id, update).await?))
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub removed: u64,
}

async fn delete_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, HttpError> {
    let _guard = state.write_lock.lock().await;
    let removed = state.nodes.delete(&id).await?;
    Ok(Json(DeleteResponse {
        success: true,
        removed,
    }))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/nodes/:parent_id", get(get_children))
        .route("/api/path/:node_id", get(get_breadcrumb))
        .route("/api/resolve", get(resolve_path))
        .route("/api/node", post(create_node))
        .route("/api/node/:id", get(get_node).put(update_node).delete(delete_node))
        .with_state(state)
}
