//! Context aggregation output types

use serde::{Deserialize, Serialize};

/// Separator placed between rendered context blocks
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// One step of a breadcrumb
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSegment {
    pub id: String,
    pub name: String,
}

/// An attached folder reachable from a node's path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttachmentSummary {
    pub id: String,
    pub name: String,
}

/// Where a context block came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockSource {
    /// The ancestor's own content
    Own { node_id: String },
    /// An article inside an attached folder hanging off the ancestor
    Attached {
        node_id: String,
        folder_id: String,
        folder_name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBlock {
    pub header: String,
    pub body: String,
    pub source: BlockSource,
}

impl ContextBlock {
    pub fn render(&self) -> String {
        format!("# CONTEXT: {}\n\n{}", self.header, self.body)
    }
}

/// The full context of a node, in emission order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextDocument {
    pub node_id: String,
    /// Slash-joined breadcrumb of the node, root name first
    pub path: String,
    pub blocks: Vec<ContextBlock>,
    /// Filenames uploaded to the node itself
    pub files: Vec<String>,
}

impl ContextDocument {
    /// Render the document as the text handed to consumers
    pub fn render(&self) -> String {
        let mut parts: Vec<String> = self.blocks.iter().map(ContextBlock::render).collect();
        if !self.files.is_empty() {
            let listing: Vec<String> = self.files.iter().map(|f| format!("- {}", f)).collect();
            parts.push(format!("# FILES: {}\n\n{}", self.path, listing.join("\n")));
        }
        parts.join(BLOCK_SEPARATOR)
    }

    /// Number of blocks contributed by attached folders
    pub fn attached_block_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| matches!(b.source, BlockSource::Attached { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn own(header: &str, body: &str) -> ContextBlock {
        ContextBlock {
            header: header.to_string(),
            body: body.to_string(),
            source: BlockSource::Own {
                node_id: "n".to_string(),
            },
        }
    }

    #[test]
    fn test_render_joins_blocks_and_files() {
        let doc = ContextDocument {
            node_id: "n".to_string(),
            path: "Root/A".to_string(),
            blocks: vec![own("Root", "welcome"), own("Root/A", "body")],
            files: vec!["scan.pdf".to_string(), "photo.png".to_string()],
        };

        assert_eq!(
            doc.render(),
            "# CONTEXT: Root\n\nwelcome\n\n---\n\n# CONTEXT: Root/A\n\nbody\n\n---\n\n# FILES: Root/A\n\n- scan.pdf\n- photo.png"
        );
    }

    #[test]
    fn test_render_empty_document() {
        let doc = ContextDocument {
            node_id: "n".to_string(),
            path: "Root".to_string(),
            blocks: vec![],
            files: vec![],
        };
        assert_eq!(doc.render(), "");
        assert_eq!(doc.attached_block_count(), 0);
    }
}
