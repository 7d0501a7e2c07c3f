//! Context endpoints
//!
//! - `GET /api/context/:id?exclude=a,b&plain=true` - Aggregated context
//! - `GET /api/attachments/:id` - Attached folders in effect for a node

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use knowledgetree_core::utils::strip_markdown;
use knowledgetree_core::{AttachmentSummary, ContextBlock};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{AppState, HttpError};

#[derive(Debug, Default, Deserialize)]
pub struct ContextQuery {
    /// Comma-separated attached folder ids to leave out
    #[serde(default)]
    pub exclude: Option<String>,
    /// Strip markdown syntax from the rendered text
    #[serde(default)]
    pub plain: bool,
}

impl ContextQuery {
    fn excluded(&self) -> HashSet<String> {
        self.exclude
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct ContextResponse {
    pub node_id: String,
    pub path: String,
    /// The whole document as one text, blocks joined in order
    pub context: String,
    pub blocks: Vec<ContextBlock>,
    /// Filenames uploaded to the node
    pub files: Vec<String>,
}

async fn get_context(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ContextQuery>,
) -> Result<Json<ContextResponse>, HttpError> {
    let document = state.context.build_context(&id, &query.excluded()).await?;

    let mut context = document.render();
    if query.plain {
        context = strip_markdown(&context);
    }

    Ok(Json(ContextResponse {
        context,
        node_id: document.node_id,
        path: document.path,
        blocks: document.blocks,
        files: document.files,
    }))
}

async fn get_attachments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AttachmentSummary>>, HttpError> {
    Ok(Json(state.context.find_attached_folder_summaries(&id).await?))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/context/:id", get(get_context))
        .route("/api/attachments/:id", get(get_attachments))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclude_list_parsing() {
        let query = ContextQuery {
            exclude: Some(" a, ,b ,".to_string()),
            plain: false,
        };
        let excluded = query.excluded();
        assert_eq!(excluded.len(), 2);
        assert!(excluded.contains("a") && excluded.contains("b"));
        assert!(ContextQuery::default().excluded().is_empty());
    }
}
