//! Context Aggregation
//!
//! Builds the text an LLM (or a technician) needs to act on a node: the
//! content of every ancestor from the root down, each followed by the
//! articles of the attached folders hanging off it.

use crate::db::TreeStore;
use crate::models::{AttachmentSummary, BlockSource, ContextBlock, ContextDocument, PATH_SEPARATOR};
use crate::services::attachment_resolver::AttachmentResolver;
use crate::services::error::NodeServiceError;
use crate::services::path_resolver::PathResolver;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Clone)]
pub struct ContextService {
    store: Arc<dyn TreeStore>,
    paths: PathResolver,
    attachments: AttachmentResolver,
}

impl ContextService {
    pub fn new(store: Arc<dyn TreeStore>) -> Self {
        Self {
            paths: PathResolver::new(store.clone()),
            attachments: AttachmentResolver::new(store.clone()),
            store,
        }
    }

    /// Aggregate the context of `id`
    ///
    /// Attached folders whose id is in `excluded` are skipped. Blocks with
    /// an identical (header, body) pair are emitted once.
    ///
    /// # Errors
    ///
    /// `NodeNotFound` if `id` is absent; never an empty success.
    pub async fn build_context(
        &self,
        id: &str,
        excluded: &HashSet<String>,
    ) -> Result<ContextDocument, NodeServiceError> {
        let ancestors = self.paths.ancestors(id).await?;

        let mut blocks = Vec::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut path = String::new();

        for ancestor in &ancestors {
            if !path.is_empty() {
                path.push(PATH_SEPARATOR);
            }
            path.push_str(&ancestor.name);

            if !ancestor.content.is_empty() {
                push_unique(
                    &mut blocks,
                    &mut seen,
                    ContextBlock {
                        header: path.clone(),
                        body: ancestor.content.clone(),
                        source: BlockSource::Own {
                            node_id: ancestor.id.clone(),
                        },
                    },
                );
            }

            for folder in self.attachments.attached_children(&ancestor.id).await? {
                if excluded.contains(&folder.id) {
                    continue;
                }
                let header = format!("{} (attached: {})", path, folder.name);
                for article in self.attachments.articles_under(&folder).await? {
                    push_unique(
                        &mut blocks,
                        &mut seen,
                        ContextBlock {
                            header: header.clone(),
                            body: article.content,
                            source: BlockSource::Attached {
                                node_id: article.id,
                                folder_id: folder.id.clone(),
                                folder_name: folder.name.clone(),
                            },
                        },
                    );
                }
            }
        }

        let files = self
            .store
            .get_files(id)
            .await?
            .into_iter()
            .map(|f| f.filename)
            .collect();

        tracing::debug!(node_id = %id, blocks = blocks.len(), "built context");

        Ok(ContextDocument {
            node_id: id.to_string(),
            path,
            blocks,
            files,
        })
    }

    /// [`build_context`](Self::build_context) rendered to text
    pub async fn build_context_text(
        &self,
        id: &str,
        excluded: &HashSet<String>,
    ) -> Result<String, NodeServiceError> {
        Ok(self.build_context(id, excluded).await?.render())
    }

    pub async fn find_attached_folder_summaries(
        &self,
        id: &str,
    ) -> Result<Vec<AttachmentSummary>, NodeServiceError> {
        self.attachments.find_attached_folder_summaries(id).await
    }
}

fn push_unique(
    blocks: &mut Vec<ContextBlock>,
    seen: &mut HashSet<(String, String)>,
    block: ContextBlock,
) {
    if seen.insert((block.header.clone(), block.body.clone())) {
        blocks.push(block);
    }
}
