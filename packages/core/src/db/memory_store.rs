//! MemoryStore - in-process TreeStore backend
//!
//! Nodes are kept in a map keyed by id, each parent holding the list of its
//! child ids (adjacency list). A single tokio `RwLock` guards the whole
//! state, so every mutation is atomic with respect to readers.
//!
//! Used by tests and by `KT_STORE=memory` for throwaway servers.

use crate::db::{DatabaseError, TreeStore};
use crate::models::{sort_children, FileRecord, Node, NodeUpdate, ROOT_ID};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct TreeState {
    nodes: HashMap<String, Node>,
    children: HashMap<String, Vec<String>>,
    files: HashMap<String, Vec<FileRecord>>,
}

impl TreeState {
    /// Ids of `id` and all of its descendants, parents before children
    fn subtree_ids(&self, id: &str) -> Result<Vec<String>, DatabaseError> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![id.to_string()];

        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                return Err(DatabaseError::corrupt_tree(format!(
                    "node '{}' reached twice while walking subtree of '{}'",
                    current, id
                )));
            }
            if let Some(kids) = self.children.get(&current) {
                stack.extend(kids.iter().cloned());
            }
            order.push(current);
        }

        Ok(order)
    }
}

/// Adjacency-list tree store held in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<TreeState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored nodes, root included
    pub async fn len(&self) -> usize {
        self.state.read().await.nodes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.nodes.is_empty()
    }

    /// Overwrite a node's parent link without any checks.
    ///
    /// Only exists so tests can build the corrupt shapes the services must
    /// survive (cycles, orphans).
    #[doc(hidden)]
    pub async fn force_parent(&self, id: &str, parent_id: Option<&str>) {
        let mut state = self.state.write().await;
        let old_parent = state.nodes.get(id).and_then(|n| n.parent_id.clone());
        if let Some(old) = old_parent {
            if let Some(kids) = state.children.get_mut(&old) {
                kids.retain(|k| k != id);
            }
        }
        if let Some(node) = state.nodes.get_mut(id) {
            node.parent_id = parent_id.map(str::to_string);
        }
        if let Some(parent) = parent_id {
            state
                .children
                .entry(parent.to_string())
                .or_default()
                .push(id.to_string());
        }
    }
}

#[async_trait]
impl TreeStore for MemoryStore {
    async fn ensure_root(&self) -> Result<Node, DatabaseError> {
        let mut state = self.state.write().await;
        let root = state
            .nodes
            .entry(ROOT_ID.to_string())
            .or_insert_with(Node::root)
            .clone();
        Ok(root)
    }

    async fn get_node(&self, id: &str) -> Result<Option<Node>, DatabaseError> {
        Ok(self.state.read().await.nodes.get(id).cloned())
    }

    async fn get_children(&self, parent_id: &str) -> Result<Vec<Node>, DatabaseError> {
        let state = self.state.read().await;
        let mut children: Vec<Node> = state
            .children
            .get(parent_id)
            .map(|ids| ids.iter().filter_map(|id| state.nodes.get(id).cloned()).collect())
            .unwrap_or_default();
        sort_children(&mut children);
        Ok(children)
    }

    async fn find_child_by_name(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<Option<Node>, DatabaseError> {
        let children = self.get_children(parent_id).await?;
        Ok(children.into_iter().find(|c| c.name == name))
    }

    async fn create_node(&self, node: Node) -> Result<Node, DatabaseError> {
        let mut state = self.state.write().await;

        if state.nodes.contains_key(&node.id) {
            return Err(DatabaseError::duplicate_id(&node.id));
        }
        match &node.parent_id {
            Some(parent_id) if state.nodes.contains_key(parent_id) => {}
            Some(parent_id) => return Err(DatabaseError::parent_not_found(parent_id)),
            None if node.id == ROOT_ID => {}
            None => return Err(DatabaseError::parent_not_found("<none>")),
        }

        if let Some(parent_id) = &node.parent_id {
            state
                .children
                .entry(parent_id.clone())
                .or_default()
                .push(node.id.clone());
        }
        state.nodes.insert(node.id.clone(), node.clone());
        Ok(node)
    }

    async fn update_node(
        &self,
        id: &str,
        update: NodeUpdate,
    ) -> Result<Option<Node>, DatabaseError> {
        let mut state = self.state.write().await;
        Ok(state.nodes.get_mut(id).map(|node| {
            update.apply_to(node);
            node.clone()
        }))
    }

    async fn delete_subtree(&self, id: &str) -> Result<u64, DatabaseError> {
        let mut state = self.state.write().await;

        let Some(parent_id) = state.nodes.get(id).map(|n| n.parent_id.clone()) else {
            return Ok(0);
        };

        // Walk first so a corrupt subtree leaves the state untouched
        let doomed = state.subtree_ids(id)?;

        if let Some(parent_id) = parent_id {
            if let Some(kids) = state.children.get_mut(&parent_id) {
                kids.retain(|k| k != id);
            }
        }
        for node_id in &doomed {
            state.nodes.remove(node_id);
            state.children.remove(node_id);
            state.files.remove(node_id);
        }

        Ok(doomed.len() as u64)
    }

    async fn add_file(&self, node_id: &str, filename: &str) -> Result<FileRecord, DatabaseError> {
        let mut state = self.state.write().await;
        if !state.nodes.contains_key(node_id) {
            return Err(DatabaseError::parent_not_found(node_id));
        }
        let record = FileRecord::new(node_id, filename);
        state
            .files
            .entry(node_id.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn get_files(&self, node_id: &str) -> Result<Vec<FileRecord>, DatabaseError> {
        Ok(self
            .state
            .read()
            .await
            .files
            .get(node_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn find_by_property(&self, key: &str, value: &str) -> Result<Vec<Node>, DatabaseError> {
        let state = self.state.read().await;
        let mut found: Vec<Node> = state
            .nodes
            .values()
            .filter(|n| n.property(key) == Some(value))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn ids_with_prefix(&self, prefix: &str) -> Result<Vec<String>, DatabaseError> {
        let state = self.state.read().await;
        let mut ids: Vec<String> = state
            .nodes
            .keys()
            .filter(|id| id.starts_with(prefix))
            .cloned()
            .collect();
        ids.sort();
        Ok(ids)
    }
}
