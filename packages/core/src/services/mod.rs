//! Business Services
//!
//! This module contains the core business logic services:
//!
//! - `NodeService` - Create/update/delete with tree invariants, merge-or-create
//! - `PathResolver` - Name paths to nodes and breadcrumbs back
//! - `AttachmentResolver` - Attached folders that apply to a node
//! - `ContextService` - Context aggregation over ancestors and attachments
//! - `TransferService` - Admin export and import
//!
//! Services coordinate between the database layer and application logic,
//! implementing business rules and orchestrating multi-step walks.

pub mod attachment_resolver;
pub mod context_service;
pub mod error;
pub mod node_service;
pub mod path_resolver;
pub mod transfer_service;

pub use attachment_resolver::AttachmentResolver;
pub use context_service::ContextService;
pub use error::{ErrorKind, NodeServiceError};
pub use node_service::{MergeOutcome, NodeService};
pub use path_resolver::{join_path, parse_path, PathResolver};
pub use transfer_service::TransferService;
