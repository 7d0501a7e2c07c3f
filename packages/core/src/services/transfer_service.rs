//! Export / Import
//!
//! The exchange format is a flat list of [`ExportRecord`]s addressed by name
//! path (root excluded), so a dump can be loaded into another tree whose ids
//! differ. Nodes written by sync jobs are read-only and left out.

use crate::models::{ExportRecord, ImportReport, Node, NodeUpdate, ROOT_ID};
use crate::services::error::{ErrorKind, NodeServiceError};
use crate::services::node_service::NodeService;
use crate::services::path_resolver::{join_path, parse_path, PathResolver};
use std::collections::HashSet;

#[derive(Clone)]
pub struct TransferService {
    nodes: NodeService,
    paths: PathResolver,
}

impl TransferService {
    pub fn new(nodes: NodeService) -> Self {
        let paths = PathResolver::new(nodes.store().clone());
        Self { nodes, paths }
    }

    /// Every non-root, non-read-only node in depth-first children order
    ///
    /// Read-only nodes are skipped but their subtrees are still walked.
    pub async fn export(&self) -> Result<Vec<ExportRecord>, NodeServiceError> {
        let store = self.nodes.store();
        let mut records = Vec::new();
        let mut visited = HashSet::from([ROOT_ID.to_string()]);
        let mut stack: Vec<(Node, Vec<String>)> = store
            .get_children(ROOT_ID)
            .await?
            .into_iter()
            .rev()
            .map(|child| (child, Vec::new()))
            .collect();

        while let Some((node, parent_names)) = stack.pop() {
            if !visited.insert(node.id.clone()) {
                return Err(NodeServiceError::corrupt_tree(format!(
                    "node '{}' reached twice during export",
                    node.id
                )));
            }

            let mut names = parent_names;
            names.push(node.name.clone());

            if node.is_folder {
                for child in store.get_children(&node.id).await?.into_iter().rev() {
                    stack.push((child, names.clone()));
                }
            }

            if !node.read_only {
                records.push(ExportRecord {
                    path: join_path(&names),
                    content: node.content,
                    is_folder: node.is_folder,
                    is_attached: node.is_attached,
                });
            }
        }

        tracing::info!(records = records.len(), "exported knowledge tree");
        Ok(records)
    }

    /// Load records, creating missing nodes and updating existing ones
    ///
    /// Records are processed in lexicographic path order so parents come
    /// first. A record rejected by a tree rule is retried once after the
    /// main pass, deepest paths first: attaching an existing folder only
    /// succeeds once its sub-folders are attached. Records that still cannot
    /// be placed are skipped and counted; storage failures abort the import.
    pub async fn import(
        &self,
        mut records: Vec<ExportRecord>,
    ) -> Result<ImportReport, NodeServiceError> {
        records.sort_by(|a, b| a.path.cmp(&b.path));
        let mut report = ImportReport::default();
        let mut deferred = Vec::new();

        for record in records {
            match self.import_record(&record).await {
                Ok(created) => report.count(created),
                Err(err) if err.kind() == ErrorKind::Internal => return Err(err),
                Err(err) if err.kind() == ErrorKind::InvalidOperation => deferred.push(record),
                Err(err) => {
                    tracing::warn!(path = %record.path, error = %err, "skipping import record");
                    report.skipped += 1;
                }
            }
        }

        for record in deferred.into_iter().rev() {
            match self.import_record(&record).await {
                Ok(created) => report.count(created),
                Err(err) if err.kind() == ErrorKind::Internal => return Err(err),
                Err(err) => {
                    tracing::warn!(path = %record.path, error = %err, "skipping import record");
                    report.skipped += 1;
                }
            }
        }

        tracing::info!(
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            "imported knowledge tree"
        );
        Ok(report)
    }

    /// Returns `true` when a node was created
    async fn import_record(&self, record: &ExportRecord) -> Result<bool, NodeServiceError> {
        let names = parse_path(&record.path);
        let Some((name, parent_names)) = names.split_last() else {
            return Err(NodeServiceError::invalid_operation("empty import path"));
        };

        let parent_id = self.paths.resolve_path(parent_names).await?;

        match self.nodes.store().find_child_by_name(&parent_id, name).await? {
            Some(existing) => {
                let update = NodeUpdate::new()
                    .with_content(record.content.clone())
                    .with_is_folder(record.is_folder)
                    .with_is_attached(record.is_attached);
                self.nodes.update(&existing.id, update).await?;
                Ok(false)
            }
            None => {
                let node = Node::new(&parent_id, name.clone(), record.is_folder, record.is_attached)
                    .with_content(record.content.clone());
                self.nodes.create_node(node).await?;
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use std::sync::Arc;

    async fn transfer() -> (NodeService, TransferService) {
        let nodes = NodeService::new(Arc::new(MemoryStore::new()));
        nodes.ensure_root().await.unwrap();
        let transfer = TransferService::new(nodes.clone());
        (nodes, transfer)
    }

    fn record(path: &str, content: &str, is_folder: bool) -> ExportRecord {
        ExportRecord {
            path: path.to_string(),
            content: content.to_string(),
            is_folder,
            is_attached: false,
        }
    }

    #[tokio::test]
    async fn test_import_twice_is_idempotent() {
        let (nodes, transfer) = transfer().await;
        let records = vec![record("A/b", "x", false), record("A", "", true)];

        let first = transfer.import(records.clone()).await.unwrap();
        assert_eq!(first, ImportReport { created: 2, updated: 0, skipped: 0 });

        let second = transfer.import(records).await.unwrap();
        assert_eq!(second, ImportReport { created: 0, updated: 2, skipped: 0 });

        let a = nodes.get_children(ROOT_ID).await.unwrap();
        assert_eq!(a.len(), 1);
        let b = nodes.get_children(&a[0].id).await.unwrap();
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].content, "x");
    }

    #[tokio::test]
    async fn test_import_skips_orphans_and_invalid_records() {
        let (_nodes, transfer) = transfer().await;
        let mut attached_article = record("Docs", "", false);
        attached_article.is_attached = true;

        let records = vec![
            record("Missing/child", "x", false),
            attached_article,
            record("", "", true),
        ];
        let report = transfer.import(records).await.unwrap();
        assert_eq!(report, ImportReport { created: 0, updated: 0, skipped: 3 });
    }

    #[tokio::test]
    async fn test_reimport_attaches_existing_subtree() {
        let (nodes, transfer) = transfer().await;
        let plain = vec![
            record("A", "", true),
            record("A/S", "", true),
            record("A/S/T", "", true),
            record("A/S/T/page.md", "p", false),
        ];
        transfer.import(plain.clone()).await.unwrap();

        let attached: Vec<ExportRecord> = plain
            .into_iter()
            .map(|mut r| {
                r.is_attached = r.is_folder;
                r
            })
            .collect();
        let report = transfer.import(attached).await.unwrap();
        assert_eq!(report, ImportReport { created: 0, updated: 4, skipped: 0 });

        let resolver = PathResolver::new(nodes.store().clone());
        for path in [vec!["A"], vec!["A", "S"], vec!["A", "S", "T"]] {
            let node = resolver.resolve_node(&path).await.unwrap();
            assert!(node.is_attached, "{} should be attached", node.name);
        }
    }

    #[tokio::test]
    async fn test_export_order_and_read_only_filter() {
        let (nodes, transfer) = transfer().await;
        let acme = nodes.create(ROOT_ID, "Acme", true, false).await.unwrap();
        nodes.create(&acme.id, "notes.md", false, false).await.unwrap();
        nodes.create(&acme.id, "Docs", true, true).await.unwrap();
        nodes
            .merge(
                Node::new_with_id("synced", Some(acme.id.clone()), "synced.md", false, false)
                    .with_read_only(true),
            )
            .await
            .unwrap();

        let paths: Vec<String> = transfer
            .export()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.path)
            .collect();
        assert_eq!(paths, vec!["Acme", "Acme/Docs", "Acme/notes.md"]);
    }

    #[tokio::test]
    async fn test_export_then_import_into_fresh_tree() {
        let (nodes, transfer) = transfer().await;
        let acme = nodes.create(ROOT_ID, "Acme", true, false).await.unwrap();
        let docs = nodes.create(&acme.id, "Docs", true, true).await.unwrap();
        let page = nodes.create(&docs.id, "vpn.md", false, false).await.unwrap();
        nodes
            .update(&page.id, NodeUpdate::new().with_content("use wireguard"))
            .await
            .unwrap();

        let dump = transfer.export().await.unwrap();
        let (fresh_nodes, fresh) = super::tests::transfer().await;
        let report = fresh.import(dump.clone()).await.unwrap();
        assert_eq!(report.created, 3);
        assert_eq!(fresh.export().await.unwrap(), dump);

        let resolver = PathResolver::new(fresh_nodes.store().clone());
        let id = resolver.resolve_path(&["Acme", "Docs", "vpn.md"]).await.unwrap();
        assert_eq!(fresh_nodes.get_node(&id).await.unwrap().content, "use wireguard");
    }
}
