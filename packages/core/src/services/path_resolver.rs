//! Path Resolver
//!
//! Maps a slash-separated name path to a node and back. Names are unique
//! only among siblings, so resolution is always anchored at the root and
//! follows one parent→child edge per segment; there is no global name lookup.

use crate::db::TreeStore;
use crate::models::{Node, PathSegment, PATH_SEPARATOR, ROOT_ID};
use crate::services::error::NodeServiceError;
use std::collections::HashSet;
use std::sync::Arc;

/// Split a path string into names, dropping empty segments
///
/// `"/Acme//Users/"` → `["Acme", "Users"]`; `""` → `[]` (the root).
pub fn parse_path(path: &str) -> Vec<String> {
    path.split(PATH_SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join names into a path string
pub fn join_path<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(&PATH_SEPARATOR.to_string())
}

#[derive(Clone)]
pub struct PathResolver {
    store: Arc<dyn TreeStore>,
}

impl PathResolver {
    pub fn new(store: Arc<dyn TreeStore>) -> Self {
        Self { store }
    }

    /// Resolve names to a node id, starting at the root
    ///
    /// An empty sequence resolves to the root.
    ///
    /// # Errors
    ///
    /// `PathNotFound` at the first segment with no matching child.
    pub async fn resolve_path<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<String, NodeServiceError> {
        Ok(self.resolve_node(names).await?.id)
    }

    /// Like [`resolve_path`](Self::resolve_path), returning the node itself
    pub async fn resolve_node<S: AsRef<str>>(&self, names: &[S]) -> Result<Node, NodeServiceError> {
        let mut current = self
            .store
            .get_node(ROOT_ID)
            .await?
            .ok_or_else(|| NodeServiceError::node_not_found(ROOT_ID))?;

        for name in names {
            current = self
                .store
                .find_child_by_name(&current.id, name.as_ref())
                .await?
                .ok_or_else(|| NodeServiceError::path_not_found(join_path(names)))?;
        }

        Ok(current)
    }

    /// Nodes from the root down to `id`, inclusive
    ///
    /// # Errors
    ///
    /// - `NodeNotFound` if `id` is absent or its parent chain does not end at the root
    /// - `CorruptTree` if the parent chain loops
    pub async fn ancestors(&self, id: &str) -> Result<Vec<Node>, NodeServiceError> {
        let mut current = self
            .store
            .get_node(id)
            .await?
            .ok_or_else(|| NodeServiceError::node_not_found(id))?;

        let mut visited = HashSet::from([current.id.clone()]);
        let mut chain = Vec::new();

        while let Some(parent_id) = current.parent_id.clone() {
            if !visited.insert(parent_id.clone()) {
                return Err(NodeServiceError::corrupt_tree(format!(
                    "parent chain of '{}' loops at '{}'",
                    id, parent_id
                )));
            }
            let parent = self.store.get_node(&parent_id).await?.ok_or_else(|| {
                tracing::warn!(node_id = %id, missing_parent = %parent_id, "orphaned node");
                NodeServiceError::node_not_found(id)
            })?;
            chain.push(current);
            current = parent;
        }

        if current.id != ROOT_ID {
            tracing::warn!(node_id = %id, top = %current.id, "node not reachable from root");
            return Err(NodeServiceError::node_not_found(id));
        }

        chain.push(current);
        chain.reverse();
        Ok(chain)
    }

    /// The `(id, name)` path from the root to `id`
    pub async fn get_breadcrumb(&self, id: &str) -> Result<Vec<PathSegment>, NodeServiceError> {
        Ok(self
            .ancestors(id)
            .await?
            .into_iter()
            .map(|node| PathSegment {
                id: node.id,
                name: node.name,
            })
            .collect())
    }

    /// The slash-joined path of `id` with the root excluded (export form)
    pub async fn relative_path(&self, id: &str) -> Result<String, NodeServiceError> {
        let names: Vec<String> = self
            .ancestors(id)
            .await?
            .into_iter()
            .skip(1)
            .map(|node| node.name)
            .collect();
        Ok(join_path(&names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::ROOT_NAME;

    async fn fixture() -> (Arc<MemoryStore>, PathResolver, Node, Node) {
        let store = Arc::new(MemoryStore::new());
        store.ensure_root().await.unwrap();
        let acme = store.create_node(Node::folder(ROOT_ID, "Acme")).await.unwrap();
        let users = store.create_node(Node::folder(&acme.id, "Users")).await.unwrap();
        let resolver = PathResolver::new(store.clone());
        (store, resolver, acme, users)
    }

    #[test]
    fn test_parse_and_join_path() {
        assert_eq!(parse_path("/Acme//Users/"), vec!["Acme", "Users"]);
        assert!(parse_path("").is_empty());
        assert_eq!(join_path(&["Acme", "Users"]), "Acme/Users");
        assert_eq!(join_path::<&str>(&[]), "");
    }

    #[tokio::test]
    async fn test_empty_path_is_root() {
        let (_store, resolver, _, _) = fixture().await;
        let empty: [&str; 0] = [];
        assert_eq!(resolver.resolve_path(&empty).await.unwrap(), ROOT_ID);
    }

    #[tokio::test]
    async fn test_resolve_and_breadcrumb_round_trip() {
        let (_store, resolver, acme, users) = fixture().await;

        let id = resolver.resolve_path(&["Acme", "Users"]).await.unwrap();
        assert_eq!(id, users.id);

        let crumbs = resolver.get_breadcrumb(&id).await.unwrap();
        let names: Vec<&str> = crumbs.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec![ROOT_NAME, "Acme", "Users"]);
        assert_eq!(crumbs[0].id, ROOT_ID);
        assert_eq!(crumbs[1].id, acme.id);
        assert_eq!(resolver.relative_path(&id).await.unwrap(), "Acme/Users");
    }

    #[tokio::test]
    async fn test_same_name_under_different_parents() {
        let (store, resolver, _acme, _users) = fixture().await;
        let other = store.create_node(Node::folder(ROOT_ID, "Globex")).await.unwrap();
        let globex_users = store.create_node(Node::folder(&other.id, "Users")).await.unwrap();

        assert_eq!(
            resolver.resolve_path(&["Globex", "Users"]).await.unwrap(),
            globex_users.id
        );
        assert_ne!(
            resolver.resolve_path(&["Acme", "Users"]).await.unwrap(),
            globex_users.id
        );
        // A global lookup of "Users" would be ambiguous; anchored lookup is not
        assert!(resolver.resolve_path(&["Users"]).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_segment_is_path_not_found() {
        let (_store, resolver, _, _) = fixture().await;
        let err = resolver
            .resolve_path(&["Acme", "Users", "bob"])
            .await
            .unwrap_err();
        assert!(matches!(err, NodeServiceError::PathNotFound { ref path } if path == "Acme/Users/bob"));
    }

    #[tokio::test]
    async fn test_breadcrumb_of_missing_node() {
        let (_store, resolver, _, _) = fixture().await;
        let err = resolver.get_breadcrumb("stale-id").await.unwrap_err();
        assert!(matches!(err, NodeServiceError::NodeNotFound { .. }));
    }

    #[tokio::test]
    async fn test_breadcrumb_of_orphan_is_not_found() {
        let (store, resolver, _, users) = fixture().await;
        store.force_parent(&users.id, None).await;
        let err = resolver.get_breadcrumb(&users.id).await.unwrap_err();
        assert!(matches!(err, NodeServiceError::NodeNotFound { .. }));
    }

    #[tokio::test]
    async fn test_breadcrumb_cycle_is_corrupt_tree() {
        let (store, resolver, acme, users) = fixture().await;
        store.force_parent(&acme.id, Some(&users.id)).await;
        let err = resolver.get_breadcrumb(&users.id).await.unwrap_err();
        assert!(matches!(err, NodeServiceError::CorruptTree { .. }));
    }
}
