//! KnowledgeTree Core Business Logic Layer
//!
//! This crate provides the knowledge tree itself: storage, the invariants
//! every write must respect, and the read-side walks (path resolution,
//! attached-folder inheritance, context aggregation).
//!
//! # Architecture
//!
//! - **Single entity type**: folders and articles are both [`Node`]s
//! - **Adjacency list**: the tree is `parent_id` links; walks are explicit and cycle-checked
//! - **libsql/Turso**: embedded SQLite-compatible database, with an in-memory store for tests
//! - **Attached folders**: a folder flagged `is_attached` feeds its articles into the
//!   context of its parent's whole subtree
//!
//! # Modules
//!
//! - [`models`] - Data structures (Node, FileRecord, ContextDocument, ...)
//! - [`services`] - Business services (NodeService, ContextService, ...)
//! - [`db`] - Storage trait and backends
//! - [`utils`] - Markdown helpers

pub mod db;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use db::{DatabaseError, MemoryStore, TreeStore, TursoStore};
pub use models::*;
pub use services::*;
