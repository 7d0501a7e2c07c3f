//! Node Service - Tree Lifecycle Operations
//!
//! This module is the only writer of the knowledge tree. It enforces the
//! invariants the stores cannot check on their own:
//!
//! - Names are valid path segments and unique among siblings
//! - Only folders have children; the root stays a folder and cannot be deleted
//! - `is_attached` implies `is_folder`
//! - A folder placed under an attached folder must itself be attached
//!
//! Every rule is checked before the store is touched, so a rejected request
//! leaves the tree unchanged.
//!
//! # Merge-or-create
//!
//! Sync jobs write through [`NodeService::merge`], keyed by deterministic
//! ids. Re-running a job overwrites content in place and never moves a node.

use crate::db::TreeStore;
use crate::models::{validate_name, FileRecord, Node, NodeUpdate, ROOT_CONTENT, ROOT_ID, ROOT_NAME};
use crate::services::error::NodeServiceError;
use std::sync::Arc;

/// Result of [`NodeService::merge`]
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    Created(Node),
    Updated(Node),
}

impl MergeOutcome {
    pub fn node(&self) -> &Node {
        match self {
            Self::Created(node) | Self::Updated(node) => node,
        }
    }

    pub fn into_node(self) -> Node {
        match self {
            Self::Created(node) | Self::Updated(node) => node,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

#[derive(Clone)]
pub struct NodeService {
    store: Arc<dyn TreeStore>,
}

impl NodeService {
    pub fn new(store: Arc<dyn TreeStore>) -> Self {
        Self { store }
    }

    /// Access the underlying store
    pub fn store(&self) -> &Arc<dyn TreeStore> {
        &self.store
    }

    /// Seed the root node if the tree is empty
    pub async fn ensure_root(&self) -> Result<Node, NodeServiceError> {
        Ok(self.store.ensure_root().await?)
    }

    pub async fn get_node(&self, id: &str) -> Result<Node, NodeServiceError> {
        self.store
            .get_node(id)
            .await?
            .ok_or_else(|| NodeServiceError::node_not_found(id))
    }

    /// Children of `parent_id`, folders first then by name
    ///
    /// # Errors
    ///
    /// `NodeNotFound` if the parent itself is absent (an empty list means
    /// the node exists and has no children).
    pub async fn get_children(&self, parent_id: &str) -> Result<Vec<Node>, NodeServiceError> {
        self.get_node(parent_id).await?;
        Ok(self.store.get_children(parent_id).await?)
    }

    /// Create a node with a fresh UUID
    pub async fn create(
        &self,
        parent_id: &str,
        name: &str,
        is_folder: bool,
        is_attached: bool,
    ) -> Result<Node, NodeServiceError> {
        self.create_node(Node::new(parent_id, name, is_folder, is_attached))
            .await
    }

    /// Create a fully built node after checking placement rules
    pub async fn create_node(&self, node: Node) -> Result<Node, NodeServiceError> {
        node.validate()?;

        let parent_id = node
            .parent_id
            .clone()
            .ok_or_else(|| NodeServiceError::invalid_operation("only the root may lack a parent"))?;
        let parent = self
            .store
            .get_node(&parent_id)
            .await?
            .ok_or_else(|| NodeServiceError::parent_not_found(&parent_id))?;

        check_placement(&parent, &node)?;
        self.check_unique_name(&parent.id, &node.name, None).await?;

        let created = self.store.create_node(node).await?;
        tracing::info!(
            node_id = %created.id,
            parent_id = %parent.id,
            name = %created.name,
            is_folder = created.is_folder,
            "created node"
        );
        Ok(created)
    }

    /// Apply a partial update
    ///
    /// The resulting node is validated as a whole before anything is written.
    pub async fn update(&self, id: &str, update: NodeUpdate) -> Result<Node, NodeServiceError> {
        let current = self.get_node(id).await?;
        if update.is_empty() {
            return Ok(current);
        }

        let mut proposed = current.clone();
        update.apply_to(&mut proposed);
        proposed.validate()?;

        if current.is_root() && !proposed.is_folder {
            return Err(NodeServiceError::invalid_operation(
                "the root must remain a folder",
            ));
        }

        let children = self.store.get_children(id).await?;
        if !proposed.is_folder && !children.is_empty() {
            return Err(NodeServiceError::invalid_operation(format!(
                "'{}' has {} children and cannot become an article",
                current.name,
                children.len()
            )));
        }
        if proposed.is_attached {
            if let Some(child) = children.iter().find(|c| c.is_folder && !c.is_attached) {
                return Err(NodeServiceError::invalid_operation(format!(
                    "cannot attach '{}': sub-folder '{}' is not attached",
                    current.name, child.name
                )));
            }
        }

        if let Some(parent_id) = &current.parent_id {
            let parent = self
                .store
                .get_node(parent_id)
                .await?
                .ok_or_else(|| NodeServiceError::parent_not_found(parent_id))?;
            check_placement(&parent, &proposed)?;
            if proposed.name != current.name {
                self.check_unique_name(parent_id, &proposed.name, Some(id))
                    .await?;
            }
        }

        let updated = self
            .store
            .update_node(id, update)
            .await?
            .ok_or_else(|| NodeServiceError::node_not_found(id))?;
        tracing::debug!(node_id = %id, "updated node");
        Ok(updated)
    }

    /// Delete a node and its whole subtree
    ///
    /// Returns the number of nodes removed.
    pub async fn delete(&self, id: &str) -> Result<u64, NodeServiceError> {
        if id == ROOT_ID {
            return Err(NodeServiceError::invalid_operation(
                "the root node cannot be deleted",
            ));
        }
        self.get_node(id).await?;

        let removed = self.store.delete_subtree(id).await?;
        tracing::info!(node_id = %id, removed, "deleted subtree");
        Ok(removed)
    }

    /// Record an uploaded file against a node
    pub async fn add_file(
        &self,
        node_id: &str,
        filename: &str,
    ) -> Result<FileRecord, NodeServiceError> {
        self.get_node(node_id).await?;
        Ok(self.store.add_file(node_id, filename).await?)
    }

    pub async fn get_files(&self, node_id: &str) -> Result<Vec<FileRecord>, NodeServiceError> {
        self.get_node(node_id).await?;
        Ok(self.store.get_files(node_id).await?)
    }

    /// Nodes whose string property `key` equals `value`
    pub async fn find_by_property(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<Node>, NodeServiceError> {
        Ok(self.store.find_by_property(key, value).await?)
    }

    pub async fn ids_with_prefix(&self, prefix: &str) -> Result<Vec<String>, NodeServiceError> {
        Ok(self.store.ids_with_prefix(prefix).await?)
    }

    /// Merge-or-create keyed by `node.id`
    ///
    /// An existing node gets `name`, `content`, `properties` and `read_only`
    /// overwritten. If it sits under a different parent than `node.parent_id`
    /// it stays where it is. A missing node is created with the same checks
    /// as [`create_node`](Self::create_node).
    pub async fn merge(&self, node: Node) -> Result<MergeOutcome, NodeServiceError> {
        let Some(existing) = self.store.get_node(&node.id).await? else {
            return Ok(MergeOutcome::Created(self.create_node(node).await?));
        };

        if existing.parent_id != node.parent_id {
            tracing::warn!(
                node_id = %node.id,
                current_parent = ?existing.parent_id,
                requested_parent = ?node.parent_id,
                "merge target lives under another parent, leaving it in place"
            );
        }

        let update = NodeUpdate {
            name: Some(node.name),
            content: Some(node.content),
            properties: Some(node.properties),
            read_only: Some(node.read_only),
            ..NodeUpdate::default()
        };
        Ok(MergeOutcome::Updated(self.update(&existing.id, update).await?))
    }

    /// Delete everything below the root and restore the root's defaults
    ///
    /// Returns the number of nodes removed.
    pub async fn reinitialize(&self) -> Result<u64, NodeServiceError> {
        self.store.ensure_root().await?;

        let mut removed = 0;
        for child in self.store.get_children(ROOT_ID).await? {
            removed += self.store.delete_subtree(&child.id).await?;
        }

        let reset = NodeUpdate::new()
            .with_name(ROOT_NAME)
            .with_content(ROOT_CONTENT);
        self.store.update_node(ROOT_ID, reset).await?;

        tracing::info!(removed, "reinitialized knowledge tree");
        Ok(removed)
    }

    async fn check_unique_name(
        &self,
        parent_id: &str,
        name: &str,
        except_id: Option<&str>,
    ) -> Result<(), NodeServiceError> {
        validate_name(name)?;
        match self.store.find_child_by_name(parent_id, name).await? {
            Some(sibling) if Some(sibling.id.as_str()) != except_id => {
                Err(NodeServiceError::invalid_operation(format!(
                    "a node named '{}' already exists here",
                    name
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Rules that depend only on the parent and the node being placed under it
fn check_placement(parent: &Node, node: &Node) -> Result<(), NodeServiceError> {
    if !parent.is_folder {
        return Err(NodeServiceError::invalid_operation(format!(
            "'{}' is an article and cannot have children",
            parent.name
        )));
    }
    if parent.is_attached && node.is_folder && !node.is_attached {
        return Err(NodeServiceError::invalid_operation(format!(
            "folder '{}' inside attached folder '{}' must also be attached",
            node.name, parent.name
        )));
    }
    Ok(())
}
