//! Attachment Resolver
//!
//! An attached folder hanging off an ancestor contributes its articles to the
//! context of every node below that ancestor. This module answers "which
//! attached folders apply here" and walks an attached folder's contents.

use crate::db::TreeStore;
use crate::models::{AttachmentSummary, Node};
use crate::services::error::NodeServiceError;
use crate::services::path_resolver::PathResolver;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Clone)]
pub struct AttachmentResolver {
    store: Arc<dyn TreeStore>,
    paths: PathResolver,
}

impl AttachmentResolver {
    pub fn new(store: Arc<dyn TreeStore>) -> Self {
        let paths = PathResolver::new(store.clone());
        Self { store, paths }
    }

    /// Attached folders that are direct children of `parent_id`, in child order
    pub async fn attached_children(&self, parent_id: &str) -> Result<Vec<Node>, NodeServiceError> {
        Ok(self
            .store
            .get_children(parent_id)
            .await?
            .into_iter()
            .filter(|c| c.is_folder && c.is_attached)
            .collect())
    }

    /// Every attached folder applying to `id`
    ///
    /// Ordered by ancestor (root first), then child order. Only direct
    /// children of ancestors count; attached folders nested inside attached
    /// folders are not picked up on their own.
    pub async fn find_attached_folders(&self, id: &str) -> Result<Vec<Node>, NodeServiceError> {
        let ancestors = self.paths.ancestors(id).await?;
        let mut seen = HashSet::new();
        let mut folders = Vec::new();

        for ancestor in &ancestors {
            for folder in self.attached_children(&ancestor.id).await? {
                if seen.insert(folder.id.clone()) {
                    folders.push(folder);
                }
            }
        }

        Ok(folders)
    }

    pub async fn find_attached_folder_summaries(
        &self,
        id: &str,
    ) -> Result<Vec<AttachmentSummary>, NodeServiceError> {
        Ok(self
            .find_attached_folders(id)
            .await?
            .into_iter()
            .map(|f| AttachmentSummary {
                id: f.id,
                name: f.name,
            })
            .collect())
    }

    /// Non-folder descendants of `folder` with non-empty content
    ///
    /// Depth-first, pre-order, siblings in child order.
    ///
    /// # Errors
    ///
    /// `CorruptTree` if a node is reached twice.
    pub async fn articles_under(&self, folder: &Node) -> Result<Vec<Node>, NodeServiceError> {
        let mut visited = HashSet::new();
        let mut stack = vec![folder.clone()];
        let mut articles = Vec::new();

        while let Some(node) = stack.pop() {
            if !visited.insert(node.id.clone()) {
                return Err(NodeServiceError::corrupt_tree(format!(
                    "node '{}' reached twice under attached folder '{}'",
                    node.id, folder.id
                )));
            }

            if node.is_folder {
                let children = self.store.get_children(&node.id).await?;
                stack.extend(children.into_iter().rev());
            } else if !node.content.is_empty() {
                articles.push(node);
            }
        }

        Ok(articles)
    }
}
