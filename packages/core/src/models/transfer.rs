//! Admin export/import records

use serde::{Deserialize, Serialize};

/// One exported node
///
/// `path` is the slash-joined chain of names from (but excluding) the root
/// down to the node, e.g. `Acme/Policies/VPN.md`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub path: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default)]
    pub is_attached: bool,
}

/// Outcome of an import run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl ImportReport {
    pub fn count(&mut self, created: bool) {
        if created {
            self.created += 1;
        } else {
            self.updated += 1;
        }
    }
}
