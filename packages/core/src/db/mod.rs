//! Database Layer
//!
//! This module handles persistence of the knowledge tree:
//!
//! - [`TreeStore`] - the storage abstraction used by every service
//! - [`TursoStore`] - embedded libsql/SQLite file backend (production)
//! - [`MemoryStore`] - adjacency list held in memory (tests, throwaway servers)
//!
//! Stores only answer single-hop questions; breadcrumb and descendant walks
//! are implemented once, in the services, on top of these primitives.

mod error;
mod memory_store;
mod tree_store;
mod turso_store;

pub use error::DatabaseError;
pub use memory_store::MemoryStore;
pub use tree_store::TreeStore;
pub use turso_store::TursoStore;
