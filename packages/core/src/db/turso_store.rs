//! TursoStore - TreeStore Implementation for the Turso/libsql Backend
//!
//! Persists the tree in an embedded SQLite-compatible file:
//!
//! - `nodes` table: one row per node, `parent_id` column is the `PARENT_OF` edge
//! - `files` table: uploaded files keyed by owning node
//!
//! # Database Connection Pattern
//!
//! Every operation opens its own connection with a 5-second busy timeout so
//! concurrent callers wait for the lock instead of failing with `SQLITE_BUSY`.
//! Writers are additionally serialized through an in-process mutex, and each
//! mutation runs inside one `BEGIN IMMEDIATE` transaction: a node and its edge
//! (or a whole deleted subtree) are written all-or-nothing.
//!
//! Subtree deletion walks the `parent_id` links explicitly with a visited set
//! instead of a recursive CTE, so corrupt (cyclic) data is reported as
//! `CorruptTree` rather than silently tolerated.

use crate::db::{DatabaseError, TreeStore};
use crate::models::{FileRecord, Node, NodeUpdate, ROOT_ID};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Builder, Connection, Database, Row};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

const NODE_COLUMNS: &str =
    "id, parent_id, name, content, is_folder, is_attached, read_only, properties, created_at, modified_at";

/// libsql-backed tree store
///
/// # Examples
///
/// ```no_run
/// use knowledgetree_core::db::TursoStore;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = TursoStore::new(PathBuf::from("./data/knowledgetree.db")).await?;
///     Ok(())
/// }
/// ```
pub struct TursoStore {
    db: Arc<Database>,
    db_path: PathBuf,
    write_lock: Mutex<()>,
}

impl TursoStore {
    /// Open (or create) the database file and initialize the schema
    ///
    /// This will:
    /// 1. Ensure the parent directory exists
    /// 2. Open/create the database file
    /// 3. Create tables and indexes (idempotent)
    /// 4. Seed the root node if missing
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        if db_path.as_os_str().is_empty() {
            return Err(DatabaseError::invalid_path(db_path));
        }
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let store = Self {
            db: Arc::new(db),
            db_path,
            write_lock: Mutex::new(()),
        };
        store.initialize_schema().await?;
        store.ensure_root().await?;

        tracing::info!(path = %store.db_path.display(), "tree store opened");
        Ok(store)
    }

    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Get a connection with busy timeout configured
    async fn connect(&self) -> Result<Connection, DatabaseError> {
        let conn = self.db.connect().map_err(DatabaseError::LibsqlError)?;
        Self::execute_pragma(&conn, "PRAGMA busy_timeout = 5000").await?;
        Ok(conn)
    }

    /// PRAGMA statements return rows, so they go through query() instead of execute()
    async fn execute_pragma(conn: &Connection, pragma: &str) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    async fn initialize_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;

        Self::execute_pragma(&conn, "PRAGMA journal_mode = WAL").await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                parent_id TEXT,
                name TEXT NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                is_folder INTEGER NOT NULL DEFAULT 0,
                is_attached INTEGER NOT NULL DEFAULT 0,
                read_only INTEGER NOT NULL DEFAULT 0,
                properties TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!("Failed to create nodes table: {}", e))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS files (
                id TEXT PRIMARY KEY,
                node_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!("Failed to create files table: {}", e))
        })?;

        for (name, sql) in [
            (
                "idx_nodes_parent",
                "CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent_id, name)",
            ),
            (
                "idx_files_node",
                "CREATE INDEX IF NOT EXISTS idx_files_node ON files(node_id)",
            ),
        ] {
            conn.execute(sql, ()).await.map_err(|e| {
                DatabaseError::initialization_failed(format!(
                    "Failed to create index '{}': {}",
                    name, e
                ))
            })?;
        }

        Ok(())
    }

    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| DatabaseError::serialization(format!("bad timestamp '{}': {}", s, e)))
    }

    /// Convert a row selected with `NODE_COLUMNS` into a Node
    fn row_to_node(row: &Row) -> Result<Node, DatabaseError> {
        let properties_json: String = row.get(7)?;
        let created_at: String = row.get(8)?;
        let modified_at: String = row.get(9)?;

        Ok(Node {
            id: row.get(0)?,
            parent_id: row.get(1)?,
            name: row.get(2)?,
            content: row.get(3)?,
            is_folder: row.get::<i64>(4)? != 0,
            is_attached: row.get::<i64>(5)? != 0,
            read_only: row.get::<i64>(6)? != 0,
            properties: serde_json::from_str(&properties_json)
                .map_err(|e| DatabaseError::serialization(e.to_string()))?,
            created_at: Self::parse_timestamp(&created_at)?,
            modified_at: Self::parse_timestamp(&modified_at)?,
        })
    }

    fn row_to_file(row: &Row) -> Result<FileRecord, DatabaseError> {
        let created_at: String = row.get(3)?;
        Ok(FileRecord {
            id: row.get(0)?,
            node_id: row.get(1)?,
            filename: row.get(2)?,
            created_at: Self::parse_timestamp(&created_at)?,
        })
    }

    async fn query_nodes(
        conn: &Connection,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Node>, DatabaseError> {
        let mut rows = conn
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Node query failed: {}", e)))?;

        let mut nodes = Vec::new();
        while let Some(row) = rows.next().await? {
            nodes.push(Self::row_to_node(&row)?);
        }
        Ok(nodes)
    }

    async fn fetch_node(conn: &Connection, id: &str) -> Result<Option<Node>, DatabaseError> {
        let sql = format!("SELECT {} FROM nodes WHERE id = ?", NODE_COLUMNS);
        Ok(Self::query_nodes(conn, &sql, [id]).await?.into_iter().next())
    }

    async fn fetch_child_ids(
        conn: &Connection,
        parent_id: &str,
    ) -> Result<Vec<String>, DatabaseError> {
        let mut rows = conn
            .query("SELECT id FROM nodes WHERE parent_id = ?", [parent_id])
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Child id query failed: {}", e)))?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<String>(0)?);
        }
        Ok(ids)
    }

    async fn insert_node(conn: &Connection, node: &Node) -> Result<(), DatabaseError> {
        let properties = serde_json::to_string(&node.properties)
            .map_err(|e| DatabaseError::serialization(e.to_string()))?;

        conn.execute(
            &format!(
                "INSERT INTO nodes ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                NODE_COLUMNS
            ),
            (
                node.id.as_str(),
                node.parent_id.as_deref(),
                node.name.as_str(),
                node.content.as_str(),
                node.is_folder as i64,
                node.is_attached as i64,
                node.read_only as i64,
                properties,
                node.created_at.to_rfc3339(),
                node.modified_at.to_rfc3339(),
            ),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to insert node: {}", e)))?;
        Ok(())
    }

    async fn begin(conn: &Connection) -> Result<(), DatabaseError> {
        conn.execute("BEGIN IMMEDIATE", ())
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e)))?;
        Ok(())
    }

    /// Commit on success, roll back on failure
    async fn finish<T>(
        conn: &Connection,
        result: Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        match result {
            Ok(value) => {
                conn.execute("COMMIT", ()).await.map_err(|e| {
                    DatabaseError::sql_execution(format!("Failed to commit transaction: {}", e))
                })?;
                Ok(value)
            }
            Err(err) => {
                let _rollback = conn.execute("ROLLBACK", ()).await;
                Err(err)
            }
        }
    }

    async fn create_in_tx(conn: &Connection, node: &Node) -> Result<(), DatabaseError> {
        if Self::fetch_node(conn, &node.id).await?.is_some() {
            return Err(DatabaseError::duplicate_id(&node.id));
        }
        match node.parent_id.as_deref() {
            Some(parent_id) => {
                if Self::fetch_node(conn, parent_id).await?.is_none() {
                    return Err(DatabaseError::parent_not_found(parent_id));
                }
            }
            None if node.id == ROOT_ID => {}
            None => return Err(DatabaseError::parent_not_found("<none>")),
        }
        Self::insert_node(conn, node).await
    }

    async fn update_in_tx(
        conn: &Connection,
        id: &str,
        update: &NodeUpdate,
    ) -> Result<Option<Node>, DatabaseError> {
        let Some(mut node) = Self::fetch_node(conn, id).await? else {
            return Ok(None);
        };
        update.apply_to(&mut node);

        let properties = serde_json::to_string(&node.properties)
            .map_err(|e| DatabaseError::serialization(e.to_string()))?;

        conn.execute(
            "UPDATE nodes SET name = ?, content = ?, is_folder = ?, is_attached = ?, read_only = ?,
                              properties = ?, modified_at = ?
             WHERE id = ?",
            (
                node.name.as_str(),
                node.content.as_str(),
                node.is_folder as i64,
                node.is_attached as i64,
                node.read_only as i64,
                properties,
                node.modified_at.to_rfc3339(),
                id,
            ),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to update node: {}", e)))?;

        Ok(Some(node))
    }

    async fn delete_in_tx(conn: &Connection, id: &str) -> Result<u64, DatabaseError> {
        if Self::fetch_node(conn, id).await?.is_none() {
            return Ok(0);
        }

        let mut visited = HashSet::new();
        let mut doomed = Vec::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                return Err(DatabaseError::corrupt_tree(format!(
                    "node '{}' reached twice while walking subtree of '{}'",
                    current, id
                )));
            }
            stack.extend(Self::fetch_child_ids(conn, &current).await?);
            doomed.push(current);
        }

        for node_id in &doomed {
            conn.execute("DELETE FROM files WHERE node_id = ?", [node_id.as_str()])
                .await
                .map_err(|e| DatabaseError::sql_execution(format!("Failed to delete files: {}", e)))?;
            conn.execute("DELETE FROM nodes WHERE id = ?", [node_id.as_str()])
                .await
                .map_err(|e| DatabaseError::sql_execution(format!("Failed to delete node: {}", e)))?;
        }

        Ok(doomed.len() as u64)
    }
}

#[async_trait]
impl TreeStore for TursoStore {
    async fn ensure_root(&self) -> Result<Node, DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let conn = self.connect().await?;

        if let Some(root) = Self::fetch_node(&conn, ROOT_ID).await? {
            return Ok(root);
        }
        let root = Node::root();
        Self::insert_node(&conn, &root).await?;
        tracing::info!("seeded root node");
        Ok(root)
    }

    async fn get_node(&self, id: &str) -> Result<Option<Node>, DatabaseError> {
        let conn = self.connect().await?;
        Self::fetch_node(&conn, id).await
    }

    async fn get_children(&self, parent_id: &str) -> Result<Vec<Node>, DatabaseError> {
        let conn = self.connect().await?;
        let sql = format!(
            "SELECT {} FROM nodes WHERE parent_id = ? ORDER BY is_folder DESC, name ASC, id ASC",
            NODE_COLUMNS
        );
        Self::query_nodes(&conn, &sql, [parent_id]).await
    }

    async fn find_child_by_name(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<Option<Node>, DatabaseError> {
        let conn = self.connect().await?;
        let sql = format!(
            "SELECT {} FROM nodes WHERE parent_id = ? AND name = ?
             ORDER BY is_folder DESC, id ASC LIMIT 1",
            NODE_COLUMNS
        );
        Ok(Self::query_nodes(&conn, &sql, (parent_id, name))
            .await?
            .into_iter()
            .next())
    }

    async fn create_node(&self, node: Node) -> Result<Node, DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let conn = self.connect().await?;

        Self::begin(&conn).await?;
        let result = Self::create_in_tx(&conn, &node).await;
        Self::finish(&conn, result).await?;
        Ok(node)
    }

    async fn update_node(
        &self,
        id: &str,
        update: NodeUpdate,
    ) -> Result<Option<Node>, DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let conn = self.connect().await?;

        Self::begin(&conn).await?;
        let result = Self::update_in_tx(&conn, id, &update).await;
        Self::finish(&conn, result).await
    }

    async fn delete_subtree(&self, id: &str) -> Result<u64, DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let conn = self.connect().await?;

        Self::begin(&conn).await?;
        let result = Self::delete_in_tx(&conn, id).await;
        Self::finish(&conn, result).await
    }

    async fn add_file(&self, node_id: &str, filename: &str) -> Result<FileRecord, DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let conn = self.connect().await?;

        if Self::fetch_node(&conn, node_id).await?.is_none() {
            return Err(DatabaseError::parent_not_found(node_id));
        }
        let record = FileRecord::new(node_id, filename);
        conn.execute(
            "INSERT INTO files (id, node_id, filename, created_at) VALUES (?, ?, ?, ?)",
            (
                record.id.as_str(),
                record.node_id.as_str(),
                record.filename.as_str(),
                record.created_at.to_rfc3339(),
            ),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to insert file: {}", e)))?;

        Ok(record)
    }

    async fn get_files(&self, node_id: &str) -> Result<Vec<FileRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                "SELECT id, node_id, filename, created_at FROM files WHERE node_id = ? ORDER BY rowid ASC",
                [node_id],
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("File query failed: {}", e)))?;

        let mut files = Vec::new();
        while let Some(row) = rows.next().await? {
            files.push(Self::row_to_file(&row)?);
        }
        Ok(files)
    }

    async fn find_by_property(&self, key: &str, value: &str) -> Result<Vec<Node>, DatabaseError> {
        let conn = self.connect().await?;
        let sql = format!(
            "SELECT {} FROM nodes WHERE json_extract(properties, ?) = ? ORDER BY id ASC",
            NODE_COLUMNS
        );
        let path = format!("$.\"{}\"", key.replace('"', ""));
        Self::query_nodes(&conn, &sql, (path, value)).await
    }

    async fn ids_with_prefix(&self, prefix: &str) -> Result<Vec<String>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                "SELECT id FROM nodes WHERE substr(id, 1, ?) = ? ORDER BY id ASC",
                (prefix.chars().count() as i64, prefix),
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Prefix query failed: {}", e)))?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<String>(0)?);
        }
        Ok(ids)
    }
}
