//! TreeStore Trait - Storage Abstraction Layer
//!
//! This module defines the `TreeStore` trait that abstracts persistence of
//! nodes, their parent links and their uploaded files. The trait enables
//! multiple backends (in-memory adjacency list, libsql/Turso file) without
//! changing the path, attachment and context algorithms built on top.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: All methods are async so the embedded SQL backend and
//!    the in-memory backend share one interface
//! 2. **Primitives only**: Stores answer single-hop questions (a node, its
//!    children, one child by name). Multi-hop walks (breadcrumbs, descendant
//!    collection) live in the services and carry their own cycle defense.
//! 3. **Atomic mutations**: Every mutating method is all-or-nothing with
//!    respect to the node, its edge and its files
//!
//! # Examples
//!
//! ```rust,no_run
//! use knowledgetree_core::db::{MemoryStore, TreeStore};
//! use knowledgetree_core::models::{Node, ROOT_ID};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), knowledgetree_core::db::DatabaseError> {
//! let store: Arc<dyn TreeStore> = Arc::new(MemoryStore::new());
//! store.ensure_root().await?;
//! let folder = store.create_node(Node::folder(ROOT_ID, "Acme")).await?;
//! let children = store.get_children(ROOT_ID).await?;
//! assert_eq!(children[0].id, folder.id);
//! # Ok(())
//! # }
//! ```

use crate::db::DatabaseError;
use crate::models::{FileRecord, Node, NodeUpdate};
use async_trait::async_trait;

/// Abstraction layer for tree persistence
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so one store can be shared by the
/// HTTP handlers and the background sync jobs.
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Create the root node if it does not exist and return it
    async fn ensure_root(&self) -> Result<Node, DatabaseError>;

    /// Get node by ID (`Ok(None)` when absent)
    async fn get_node(&self, id: &str) -> Result<Option<Node>, DatabaseError>;

    /// Direct children, folders first then by name
    ///
    /// Returns an empty list for unknown ids; callers that need to tell
    /// "no children" from "no node" check `get_node` first.
    async fn get_children(&self, parent_id: &str) -> Result<Vec<Node>, DatabaseError>;

    /// The direct child of `parent_id` named `name`
    ///
    /// If duplicate names slipped in (e.g. concurrent creates), the first in
    /// child order wins.
    async fn find_child_by_name(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<Option<Node>, DatabaseError>;

    /// Insert a node together with its parent edge
    ///
    /// # Errors
    ///
    /// - `ParentNotFound` if `node.parent_id` does not exist
    /// - `DuplicateId` if a node with `node.id` already exists
    async fn create_node(&self, node: Node) -> Result<Node, DatabaseError>;

    /// Apply a partial update, returning the updated node (`Ok(None)` if absent)
    async fn update_node(&self, id: &str, update: NodeUpdate)
        -> Result<Option<Node>, DatabaseError>;

    /// Remove a node, every transitive descendant and all their files
    ///
    /// Returns the number of nodes removed; `0` if the id is absent.
    async fn delete_subtree(&self, id: &str) -> Result<u64, DatabaseError>;

    /// Record an uploaded file for `node_id`
    async fn add_file(&self, node_id: &str, filename: &str) -> Result<FileRecord, DatabaseError>;

    /// Files of a node in upload order
    async fn get_files(&self, node_id: &str) -> Result<Vec<FileRecord>, DatabaseError>;

    /// Nodes whose string property `key` equals `value`
    async fn find_by_property(&self, key: &str, value: &str) -> Result<Vec<Node>, DatabaseError>;

    /// Ids starting with `prefix`
    async fn ids_with_prefix(&self, prefix: &str) -> Result<Vec<String>, DatabaseError>;
}
