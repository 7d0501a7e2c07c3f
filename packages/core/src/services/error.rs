//! Service errors
//!
//! Store errors are folded into these on the way up; structural store
//! failures keep their meaning, everything else becomes `DatabaseError`.

use crate::db::DatabaseError;
use crate::models::ValidationError;
use thiserror::Error;

/// Coarse classification callers (the HTTP layer) map to responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Node, path or parent absent
    NotFound,
    /// The request would break a tree invariant
    InvalidOperation,
    /// Storage failure or corrupt data
    Internal,
}

/// Errors of every tree operation
#[derive(Error, Debug)]
pub enum NodeServiceError {
    /// Node not found by ID (or not reachable from the root)
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// No node at this name path
    #[error("Path not found: {path}")]
    PathNotFound { path: String },

    /// Parent of a node being created is absent
    #[error("Parent node not found: {parent_id}")]
    ParentNotFound { parent_id: String },

    /// Tree invariant violation (attachment placement, deleting root, ...)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Validation failed for node fields
    #[error("Node validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Parent links form a cycle
    #[error("Tree structure is corrupt: {context}")]
    CorruptTree { context: String },

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    DatabaseError(DatabaseError),
}

impl NodeServiceError {
    /// Create a node not found error
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    pub fn path_not_found(path: impl Into<String>) -> Self {
        Self::PathNotFound { path: path.into() }
    }

    pub fn parent_not_found(parent_id: impl Into<String>) -> Self {
        Self::ParentNotFound {
            parent_id: parent_id.into(),
        }
    }

    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    pub fn corrupt_tree(context: impl Into<String>) -> Self {
        Self::CorruptTree {
            context: context.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NodeNotFound { .. } | Self::PathNotFound { .. } | Self::ParentNotFound { .. } => {
                ErrorKind::NotFound
            }
            Self::InvalidOperation(_) | Self::ValidationFailed(_) => ErrorKind::InvalidOperation,
            Self::CorruptTree { .. } | Self::DatabaseError(_) => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<DatabaseError> for NodeServiceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ParentNotFound { parent_id } => Self::ParentNotFound { parent_id },
            DatabaseError::DuplicateId { id } => {
                Self::InvalidOperation(format!("node id '{}' already exists", id))
            }
            DatabaseError::CorruptTree { context } => Self::CorruptTree { context },
            other => Self::DatabaseError(other),
        }
    }
}
