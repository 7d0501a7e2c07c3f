//! End-to-end tree scenarios on the libsql backend

use knowledgetree_core::db::TursoStore;
use knowledgetree_core::services::{
    ContextService, ErrorKind, NodeService, PathResolver, TransferService,
};
use knowledgetree_core::{ExportRecord, Node, NodeUpdate, ROOT_ID, ROOT_NAME};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

struct Services {
    nodes: NodeService,
    paths: PathResolver,
    context: ContextService,
    transfer: TransferService,
    _temp_dir: TempDir,
}

async fn create_test_services() -> Services {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(
        TursoStore::new(temp_dir.path().join("tree.db"))
            .await
            .unwrap(),
    );
    let nodes = NodeService::new(store.clone());
    Services {
        paths: PathResolver::new(store.clone()),
        context: ContextService::new(store),
        transfer: TransferService::new(nodes.clone()),
        nodes,
        _temp_dir: temp_dir,
    }
}

/// Root / Acme / Users / alice, with an attached Tickets folder under alice
async fn seed_acme(s: &Services) -> Node {
    s.nodes
        .update(ROOT_ID, NodeUpdate::new().with_content(""))
        .await
        .unwrap();
    let acme = s.nodes.create(ROOT_ID, "Acme", true, false).await.unwrap();
    let users = s.nodes.create(&acme.id, "Users", true, false).await.unwrap();
    let alice = s.nodes.create(&users.id, "alice", true, false).await.unwrap();
    let tickets = s.nodes.create(&alice.id, "Tickets", true, true).await.unwrap();
    s.nodes
        .create_node(Node::article(&tickets.id, "t1", "ticket body"))
        .await
        .unwrap();
    alice
}

#[tokio::test]
async fn test_acme_context_has_single_ticket_block() {
    let s = create_test_services().await;
    let alice = seed_acme(&s).await;

    let doc = s.context.build_context(&alice.id, &HashSet::new()).await.unwrap();
    assert_eq!(doc.blocks.len(), 1);
    assert!(doc.blocks[0].header.contains("Acme/Users/alice"));
    assert!(doc.blocks[0].header.contains("Tickets"));
    assert_eq!(doc.blocks[0].body, "ticket body");
}

#[tokio::test]
async fn test_resolve_path_and_breadcrumb() {
    let s = create_test_services().await;
    let alice = seed_acme(&s).await;

    let id = s.paths.resolve_path(&["Acme", "Users", "alice"]).await.unwrap();
    assert_eq!(id, alice.id);

    let err = s.paths.resolve_path(&["Acme", "Users", "bob"]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let crumbs = s.paths.get_breadcrumb(&id).await.unwrap();
    let names: Vec<&str> = crumbs.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec![ROOT_NAME, "Acme", "Users", "alice"]);

    // Consecutive breadcrumb entries are parent/child edges
    for pair in crumbs.windows(2) {
        let child = s.nodes.get_node(&pair[1].id).await.unwrap();
        assert_eq!(child.parent_id.as_deref(), Some(pair[0].id.as_str()));
    }
}

#[tokio::test]
async fn test_delete_folder_removes_descendants() {
    let s = create_test_services().await;
    seed_acme(&s).await;
    let acme = s.paths.resolve_node(&["Acme"]).await.unwrap();
    let users = s.paths.resolve_node(&["Acme", "Users"]).await.unwrap();

    assert_eq!(s.nodes.delete(&acme.id).await.unwrap(), 5);
    let err = s.nodes.get_children(&users.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_plain_folder_under_attached_folder_rejected() {
    let s = create_test_services().await;
    seed_acme(&s).await;
    let tickets = s
        .paths
        .resolve_node(&["Acme", "Users", "alice", "Tickets"])
        .await
        .unwrap();

    let err = s.nodes.create(&tickets.id, "Archive", true, false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    // Nothing was written
    assert_eq!(s.nodes.get_children(&tickets.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_import_twice_yields_one_node_per_path() {
    let s = create_test_services().await;
    let records = vec![
        ExportRecord {
            path: "A".to_string(),
            content: String::new(),
            is_folder: true,
            is_attached: false,
        },
        ExportRecord {
            path: "A/b".to_string(),
            content: "x".to_string(),
            is_folder: false,
            is_attached: false,
        },
    ];

    s.transfer.import(records.clone()).await.unwrap();
    s.transfer.import(records).await.unwrap();

    let a = s.nodes.get_children(ROOT_ID).await.unwrap();
    assert_eq!(a.len(), 1);
    let b = s.nodes.get_children(&a[0].id).await.unwrap();
    assert_eq!(b.len(), 1);
    assert_eq!(b[0].content, "x");
}
