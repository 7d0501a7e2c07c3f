//! Uploaded file attachments
//!
//! A file belongs to exactly one node (the `HAS_FILE` relation) and has no
//! position in the tree. The bytes live in the upload directory; only the
//! stored filename is kept here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub node_id: String,
    pub filename: String,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn new(node_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            node_id: node_id.into(),
            filename: filename.into(),
            created_at: Utc::now(),
        }
    }
}
