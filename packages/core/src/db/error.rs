//! Tree store errors

use std::path::PathBuf;
use thiserror::Error;

/// Tree store errors
///
/// Covers connection and SQL failures of the persistent backend plus the
/// structural errors (`ParentNotFound`, `DuplicateId`, `CorruptTree`) that
/// all backends share. Business-rule errors live in the service layer.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The libsql database file could not be opened
    #[error("Failed to connect to database at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Creating the nodes/files tables or the root row failed
    #[error("Failed to initialize database schema: {0}")]
    InitializationFailed(String),

    /// The path is not a file path libsql accepts
    #[error("Invalid database path: {path}")]
    InvalidPath { path: PathBuf },

    /// The directory holding the database file could not be created
    #[error("Failed to create parent directory for database: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    #[error("Database operation failed: {0}")]
    LibsqlError(#[from] libsql::Error),

    /// A statement failed; `context` names the operation
    #[error("SQL execution failed: {context}")]
    SqlExecutionError { context: String },

    /// The parent of a node being created does not exist
    #[error("Parent node not found: {parent_id}")]
    ParentNotFound { parent_id: String },

    /// A node with this id already exists
    #[error("Node already exists: {id}")]
    DuplicateId { id: String },

    /// The stored parent links form a cycle
    #[error("Tree structure is corrupt: {context}")]
    CorruptTree { context: String },

    /// Stored JSON or timestamps could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DatabaseError {
    pub fn connection_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::ConnectionFailed { path, source }
    }

    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    pub fn invalid_path(path: PathBuf) -> Self {
        Self::InvalidPath { path }
    }

    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }

    pub fn parent_not_found(parent_id: impl Into<String>) -> Self {
        Self::ParentNotFound {
            parent_id: parent_id.into(),
        }
    }

    pub fn duplicate_id(id: impl Into<String>) -> Self {
        Self::DuplicateId { id: id.into() }
    }

    pub fn corrupt_tree(context: impl Into<String>) -> Self {
        Self::CorruptTree {
            context: context.into(),
        }
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}
