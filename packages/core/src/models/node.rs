//! Node Model - the single entity type of the knowledge tree
//!
//! Every folder and article is a [`Node`]. The tree shape is carried by
//! `parent_id` (the `PARENT_OF` edge, stored as an adjacency list), so a node
//! and the edge to its parent are always written together.
//!
//! # Invariants
//!
//! - Exactly one node has no parent: the root, with id [`ROOT_ID`]
//! - Articles (`is_folder = false`) never have children
//! - `is_attached = true` implies `is_folder = true`
//! - Names are unique among the direct children of one parent, never globally

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Id of the distinguished root node
pub const ROOT_ID: &str = "root";

/// Display name of the root node
pub const ROOT_NAME: &str = "KnowledgeTree Root";

/// Content seeded into the root node on first start
pub const ROOT_CONTENT: &str = "# Welcome to KnowledgeTree";

/// Separator used when joining node names into a path
pub const PATH_SEPARATOR: char = '/';

/// Validation errors for Node fields
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Node name must not be empty")]
    EmptyName,

    #[error("Node name '{0}' must not contain '/'")]
    NameContainsSeparator(String),

    #[error("Invalid node ID: {0}")]
    InvalidId(String),

    #[error("Node '{0}' is attached but is not a folder")]
    AttachedArticle(String),

    #[error("Properties validation failed: {0}")]
    InvalidProperties(String),
}

/// A folder or article in the knowledge tree.
///
/// # Examples
///
/// ```rust
/// # use knowledgetree_core::models::{Node, ROOT_ID};
/// let folder = Node::folder(ROOT_ID, "Acme");
/// let article = Node::article(&folder.id, "Onboarding.md", "# Welcome");
/// assert!(folder.is_folder);
/// assert_eq!(article.parent_id.as_deref(), Some(folder.id.as_str()));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier (UUID for user-created nodes, deterministic for synced ones)
    pub id: String,

    /// Parent node ID; `None` only for the root
    pub parent_id: Option<String>,

    /// Display label, unique among siblings
    pub name: String,

    /// Markdown body; empty for most folders
    pub content: String,

    pub is_folder: bool,

    /// Marks a folder as an inheritance source for its parent's subtree
    pub is_attached: bool,

    /// Set on nodes written by sync jobs; excluded from export
    pub read_only: bool,

    /// String-valued sync metadata (e.g. `user_email`)
    #[serde(default = "empty_properties")]
    pub properties: serde_json::Value,

    pub created_at: DateTime<Utc>,

    pub modified_at: DateTime<Utc>,
}

fn empty_properties() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Node {
    /// Create a node with a fresh UUID under `parent_id`
    pub fn new(
        parent_id: &str,
        name: impl Into<String>,
        is_folder: bool,
        is_attached: bool,
    ) -> Self {
        Self::new_with_id(
            Uuid::new_v4().to_string(),
            Some(parent_id.to_string()),
            name,
            is_folder,
            is_attached,
        )
    }

    /// Create a node with a caller-chosen id (sync jobs use natural keys)
    pub fn new_with_id(
        id: impl Into<String>,
        parent_id: Option<String>,
        name: impl Into<String>,
        is_folder: bool,
        is_attached: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            parent_id,
            name: name.into(),
            content: String::new(),
            is_folder,
            is_attached,
            read_only: false,
            properties: empty_properties(),
            created_at: now,
            modified_at: now,
        }
    }

    /// Plain (non-attached) folder
    pub fn folder(parent_id: &str, name: impl Into<String>) -> Self {
        Self::new(parent_id, name, true, false)
    }

    /// Attached folder: its articles are inherited by the parent's subtree
    pub fn attached_folder(parent_id: &str, name: impl Into<String>) -> Self {
        Self::new(parent_id, name, true, true)
    }

    /// Article with content
    pub fn article(parent_id: &str, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(parent_id, name, false, false).with_content(content)
    }

    /// The root node as seeded on first start
    pub fn root() -> Self {
        Self::new_with_id(ROOT_ID, None, ROOT_NAME, true, false).with_content(ROOT_CONTENT)
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Set a single string property
    pub fn with_property(mut self, key: &str, value: impl Into<String>) -> Self {
        if let Some(map) = self.properties.as_object_mut() {
            map.insert(key.to_string(), serde_json::Value::String(value.into()));
        }
        self
    }

    /// Read a string property
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT_ID
    }

    /// Validate field-level rules that do not need the rest of the tree
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::InvalidId(self.id.clone()));
        }
        validate_name(&self.name)?;
        if self.is_attached && !self.is_folder {
            return Err(ValidationError::AttachedArticle(self.name.clone()));
        }
        if !self.properties.is_object() {
            return Err(ValidationError::InvalidProperties(
                "properties must be a JSON object".to_string(),
            ));
        }
        Ok(())
    }
}

/// Check that a name can be a path segment
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.contains(PATH_SEPARATOR) {
        return Err(ValidationError::NameContainsSeparator(name.to_string()));
    }
    Ok(())
}

/// Partial update for a node
///
/// Only `Some` fields are applied. `properties` replaces the whole object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_folder: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_attached: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,
}

impl NodeUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_is_folder(mut self, is_folder: bool) -> Self {
        self.is_folder = Some(is_folder);
        self
    }

    pub fn with_is_attached(mut self, is_attached: bool) -> Self {
        self.is_attached = Some(is_attached);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.content.is_none()
            && self.is_folder.is_none()
            && self.is_attached.is_none()
            && self.read_only.is_none()
            && self.properties.is_none()
    }

    /// Apply this update to a node in place, bumping `modified_at`
    pub fn apply_to(&self, node: &mut Node) {
        if let Some(name) = &self.name {
            node.name = name.clone();
        }
        if let Some(content) = &self.content {
            node.content = content.clone();
        }
        if let Some(is_folder) = self.is_folder {
            node.is_folder = is_folder;
        }
        if let Some(is_attached) = self.is_attached {
            node.is_attached = is_attached;
        }
        if let Some(read_only) = self.read_only {
            node.read_only = read_only;
        }
        if let Some(properties) = &self.properties {
            node.properties = properties.clone();
        }
        node.modified_at = Utc::now();
    }
}

/// Sort siblings the way every listing presents them: folders first, then
/// by name, then by id so equal names stay deterministic.
pub fn sort_children(children: &mut [Node]) {
    children.sort_by(|a, b| {
        b.is_folder
            .cmp(&a.is_folder)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
}
