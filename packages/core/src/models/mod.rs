//! Data Models
//!
//! This module contains the data structures shared by the store, the
//! services and the HTTP layer:
//!
//! - `Node` - Folders and articles of the knowledge tree
//! - `FileRecord` - Uploaded files owned by a node
//! - `ContextDocument` - The aggregated context of a node
//! - `ExportRecord` - One line of the admin export/import format

mod context;
mod file;
mod node;
mod transfer;

pub use context::{
    AttachmentSummary, BlockSource, ContextBlock, ContextDocument, PathSegment, BLOCK_SEPARATOR,
};
pub use file::FileRecord;
pub use node::{
    sort_children, validate_name, Node, NodeUpdate, ValidationError, PATH_SEPARATOR, ROOT_CONTENT,
    ROOT_ID, ROOT_NAME,
};
pub use transfer::{ExportRecord, ImportReport};
