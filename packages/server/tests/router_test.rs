//! End-to-end tests of the HTTP API over an in-memory tree

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use knowledgetree_core::{MemoryStore, NodeService, TreeStore, ROOT_ID, ROOT_NAME};
use knowledgetree_server::{create_router, AppState, ServerConfig, StoreKind};
use knowledgetree_sync::{JobRunner, SettingsHandle, SyncJobs};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    _dir: TempDir,
    config: ServerConfig,
}

async fn setup() -> TestApp {
    let dir = TempDir::new().unwrap();
    let config = ServerConfig {
        upload_dir: dir.path().join("uploads"),
        settings_path: dir.path().join("settings.json"),
        database_path: dir.path().join("unused.db"),
        store: StoreKind::Memory,
        ..ServerConfig::default()
    };

    let store: Arc<dyn TreeStore> = Arc::new(MemoryStore::new());
    let nodes = NodeService::new(store.clone());
    nodes.ensure_root().await.unwrap();

    let settings = SettingsHandle::default();
    let jobs = JobRunner::new(Arc::new(SyncJobs::new(nodes, settings.clone())));
    let state = AppState::new(store, jobs, settings, &config);

    TestApp {
        router: create_router(state),
        _dir: dir,
        config,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn json(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let (status, bytes) = self.send(request).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create(&self, body: Value) -> String {
        let (status, created) = self.json("POST", "/api/node", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", created);
        created["id"].as_str().unwrap().to_string()
    }
}

fn multipart_upload(uri: &str, field: &str, filename: &str, contents: &str) -> Request<Body> {
    let boundary = "knowledgetree-test-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
         Content-Type: text/plain\r\n\r\n{contents}\r\n--{b}--\r\n",
        b = boundary,
    );
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = setup().await;
    let (status, body) = app.json("GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_node_lifecycle() {
    let app = setup().await;

    let folder = app
        .create(json!({ "name": "Acme", "is_folder": true }))
        .await;
    let article = app
        .create(json!({
            "parent_id": folder,
            "name": "Overview.md",
            "content": "# Acme\n\nManaged since 2019."
        }))
        .await;

    let (status, children) = app.json("GET", &format!("/api/nodes/{}", ROOT_ID), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(children.as_array().unwrap().len(), 1);
    assert_eq!(children[0]["name"], "Acme");
    assert_eq!(children[0]["is_folder"], true);

    let (status, view) = app.json("GET", &format!("/api/node/{}", article), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["name"], "Overview.md");
    assert!(view["content_html"].as_str().unwrap().contains("<h1>Acme</h1>"));
    assert_eq!(view["files"], json!([]));

    let (status, updated) = app
        .json(
            "PUT",
            &format!("/api/node/{}", article),
            Some(json!({ "content": "Managed since 2020." })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["content"], "Managed since 2020.");
    assert_eq!(updated["name"], "Overview.md");

    let (status, deleted) = app.json("DELETE", &format!("/api/node/{}", folder), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["removed"], 2);

    let (status, error) = app.json("GET", &format!("/api/node/{}", article), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["code"], "NODE_NOT_FOUND");
}

#[tokio::test]
async fn test_write_errors_map_to_client_statuses() {
    let app = setup().await;
    app.create(json!({ "name": "Acme", "is_folder": true })).await;

    let (status, error) = app
        .json("POST", "/api/node", Some(json!({ "name": "Acme", "is_folder": true })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "duplicate sibling: {}", error);

    let (status, error) = app
        .json(
            "POST",
            "/api/node",
            Some(json!({ "parent_id": "missing", "name": "Orphan.md" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["code"], "PARENT_NOT_FOUND");

    let (status, error) = app.json("DELETE", &format!("/api/node/{}", ROOT_ID), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "INVALID_OPERATION");

    let (status, _) = app.json("GET", "/api/nodes/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_resolve_and_breadcrumb() {
    let app = setup().await;
    let folder = app.create(json!({ "name": "Acme", "is_folder": true })).await;
    let article = app
        .create(json!({ "parent_id": folder, "name": "Network.md", "content": "VLAN 10" }))
        .await;

    let (status, node) = app.json("GET", "/api/resolve?path=Acme/Network.md", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(node["id"], article.as_str());

    let (status, error) = app.json("GET", "/api/resolve?path=Acme/Nope.md", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["code"], "PATH_NOT_FOUND");

    let (status, crumbs) = app.json("GET", &format!("/api/path/{}", article), None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = crumbs
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec![ROOT_NAME, "Acme", "Network.md"]);
}

#[tokio::test]
async fn test_context_includes_attached_folders() {
    let app = setup().await;
    let company = app.create(json!({ "name": "Acme", "is_folder": true })).await;
    let policies = app
        .create(json!({
            "parent_id": company,
            "name": "Policies",
            "is_folder": true,
            "is_attached": true
        }))
        .await;
    app.create(json!({
        "parent_id": policies,
        "name": "Passwords.md",
        "content": "Rotate every 90 days."
    }))
    .await;
    let ticket = app
        .create(json!({ "parent_id": company, "name": "Ticket.md", "content": "Printer jammed" }))
        .await;

    let (status, context) = app.json("GET", &format!("/api/context/{}", ticket), None).await;
    assert_eq!(status, StatusCode::OK);
    let text = context["context"].as_str().unwrap();
    assert!(text.contains("# CONTEXT: "));
    assert!(text.contains("Rotate every 90 days."));
    assert!(text.contains("Printer jammed"));
    assert!(text.find("Rotate every 90 days.") < text.find("Printer jammed"));

    let (_, excluded) = app
        .json("GET", &format!("/api/context/{}?exclude={}", ticket, policies), None)
        .await;
    assert!(!excluded["context"].as_str().unwrap().contains("Rotate every 90 days."));

    let (status, attachments) = app
        .json("GET", &format!("/api/attachments/{}", ticket), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(attachments, json!([{ "id": policies, "name": "Policies" }]));

    let (status, _) = app.json("GET", "/api/context/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_and_serve_file() {
    let app = setup().await;
    let article = app
        .create(json!({ "name": "Laptop.md", "content": "ThinkPad" }))
        .await;

    let (status, body) = app
        .send(multipart_upload(
            &format!("/api/upload/{}", article),
            "file",
            "warranty.txt",
            "valid until 2027",
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let uploaded: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(uploaded["filename"], "warranty.txt");
    assert_eq!(uploaded["url"], format!("/uploads/{}/warranty.txt", article));
    assert!(app.config.upload_dir.join(&article).join("warranty.txt").exists());

    let (_, view) = app.json("GET", &format!("/api/node/{}", article), None).await;
    assert_eq!(view["files"][0]["filename"], "warranty.txt");

    let (_, context) = app.json("GET", &format!("/api/context/{}", article), None).await;
    assert_eq!(context["files"], json!(["warranty.txt"]));

    let (status, served) = app
        .send(
            Request::builder()
                .uri(format!("/uploads/{}/warranty.txt", article))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(served, b"valid until 2027");
}

#[tokio::test]
async fn test_same_filename_on_two_nodes_keeps_both() {
    let app = setup().await;
    let laptop = app.create(json!({ "name": "Laptop.md" })).await;
    let desktop = app.create(json!({ "name": "Desktop.md" })).await;

    for (node, contents) in [(&laptop, "laptop receipt"), (&desktop, "desktop receipt")] {
        let (status, _) = app
            .send(multipart_upload(
                &format!("/api/upload/{}", node),
                "file",
                "receipt.txt",
                contents,
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    for (node, contents) in [(&laptop, "laptop receipt"), (&desktop, "desktop receipt")] {
        let stored = std::fs::read_to_string(app.config.upload_dir.join(node).join("receipt.txt"))
            .unwrap();
        assert_eq!(stored, contents);
    }
}

#[tokio::test]
async fn test_upload_rejects_missing_file_part_and_unknown_node() {
    let app = setup().await;
    let article = app.create(json!({ "name": "Laptop.md" })).await;

    let (status, body) = app
        .send(multipart_upload(
            &format!("/api/upload/{}", article),
            "attachment",
            "warranty.txt",
            "x",
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["message"], "No file part");

    let (status, _) = app
        .send(multipart_upload("/api/upload/missing", "file", "warranty.txt", "x"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_export_import_and_reinitialize() {
    let app = setup().await;
    let folder = app.create(json!({ "name": "Acme", "is_folder": true })).await;
    app.create(json!({ "parent_id": folder, "name": "Wifi.md", "content": "SSID acme" }))
        .await;

    let (status, exported) = app.json("GET", "/api/admin/export", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        exported,
        json!([
            { "path": "Acme", "content": "", "is_folder": true, "is_attached": false },
            {
                "path": "Acme/Wifi.md",
                "content": "SSID acme",
                "is_folder": false,
                "is_attached": false
            }
        ])
    );

    let (status, reset) = app.json("POST", "/api/admin/reinitialize_db", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reset["removed"], 2);

    let (_, children) = app.json("GET", &format!("/api/nodes/{}", ROOT_ID), None).await;
    assert_eq!(children, json!([]));

    let (status, report) = app.json("POST", "/api/admin/import", Some(exported)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report, json!({ "created": 2, "updated": 0, "skipped": 0 }));

    let (status, node) = app.json("GET", "/api/resolve?path=Acme/Wifi.md", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(node["content"], "SSID acme");
}

#[tokio::test]
async fn test_settings_round_trip_to_disk() {
    let app = setup().await;

    let (status, settings) = app.json("GET", "/api/admin/settings", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settings["freshservice_configured"], false);
    assert_eq!(settings["datto_configured"], false);

    let (status, saved) = app
        .json(
            "POST",
            "/api/admin/settings",
            Some(json!({ "freshservice_interval_minutes": 15, "datto_interval_minutes": 60 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["freshservice_interval_minutes"], 15);

    let on_disk: Value =
        serde_json::from_str(&std::fs::read_to_string(&app.config.settings_path).unwrap()).unwrap();
    assert_eq!(on_disk["datto_interval_minutes"], 60);

    let (_, reread) = app.json("GET", "/api/admin/settings", None).await;
    assert_eq!(reread["datto_interval_minutes"], 60);
}

#[tokio::test]
async fn test_run_job() {
    let app = setup().await;

    let (status, error) = app.json("POST", "/api/admin/run_job/payroll", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "INVALID_INPUT");

    let (status, started) = app.json("POST", "/api/admin/run_job/freshservice", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(started, json!({ "started": true, "job": "directory" }));
}
