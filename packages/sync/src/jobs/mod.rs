//! Sync Jobs
//!
//! Each job pulls one upstream dataset and merges it into the tree under
//! deterministic ids, so a re-run updates nodes in place:
//!
//! | id | node |
//! |---|---|
//! | `companies_root` | "Companies" folder under the root |
//! | `company_{acct}` | company folder |
//! | `users_for_{acct}` | the company's "Users" folder |
//! | `user_{email}` | user folder |
//! | `contact_for_{email}` | `Contact.md` |
//! | `tickets_for_{email}` | attached "Tickets" folder |
//! | `ticket_{id}` | ticket article |
//! | `device_{uid}` | computer article |
//!
//! Everything a job writes is read-only for users.

pub mod devices;
pub mod directory;
pub mod templates;
pub mod tickets;

use crate::datto::DattoClient;
use crate::error::SyncError;
use crate::freshservice::FreshserviceClient;
use crate::settings::SettingsHandle;
use async_trait::async_trait;
use knowledgetree_core::services::{MergeOutcome, NodeService};
use knowledgetree_core::Node;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub use tickets::TicketMode;

pub const COMPANIES_ROOT_ID: &str = "companies_root";

/// Property holding a user's e-mail on user folders and their articles
pub const USER_EMAIL_PROPERTY: &str = "user_email";

/// Property linking a user folder to its Freshservice requester
pub const REQUESTER_ID_PROPERTY: &str = "freshservice_requester_id";

pub fn company_id(account_number: &str) -> String {
    format!("company_{}", account_number)
}

pub fn users_folder_id(account_number: &str) -> String {
    format!("users_for_{}", account_number)
}

pub fn user_id(email: &str) -> String {
    format!("user_{}", email)
}

pub fn contact_id(email: &str) -> String {
    format!("contact_for_{}", email)
}

pub fn tickets_folder_id(email: &str) -> String {
    format!("tickets_for_{}", email)
}

pub fn ticket_id(id: u64) -> String {
    format!("{}{}", tickets::TICKET_ID_PREFIX, id)
}

pub fn device_id(uid: &str) -> String {
    format!("device_{}", uid)
}

/// The kinds of sync job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Freshservice departments and requesters
    Directory,
    /// Freshservice tickets
    Tickets,
    /// Datto RMM devices
    Devices,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::Directory, JobKind::Tickets, JobKind::Devices];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Tickets => "tickets",
            Self::Devices => "devices",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Directory => 0,
            Self::Tickets => 1,
            Self::Devices => 2,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    /// Accepts the job names and the upstream names used by the admin API
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "directory" | "freshservice" => Ok(Self::Directory),
            "tickets" => Ok(Self::Tickets),
            "devices" | "datto" => Ok(Self::Devices),
            other => Err(format!("unknown sync job '{}'", other)),
        }
    }
}

/// Per-run counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl SyncReport {
    pub fn record(&mut self, outcome: &MergeOutcome) {
        if outcome.is_created() {
            self.created += 1;
        } else {
            self.updated += 1;
        }
    }
}

/// Merge `node`, counting the outcome
///
/// Record-level failures (name clash, vanished parent) are logged and
/// counted as skipped; `None` is returned so the caller can skip dependants.
pub(crate) async fn merge_counted(
    nodes: &NodeService,
    node: Node,
    report: &mut SyncReport,
) -> Result<Option<Node>, SyncError> {
    let id = node.id.clone();
    match nodes.merge(node).await.map_err(SyncError::from) {
        Ok(outcome) => {
            tracing::debug!(node_id = %id, created = outcome.is_created(), "merged sync node");
            report.record(&outcome);
            Ok(Some(outcome.into_node()))
        }
        Err(err) if err.is_record_level() => {
            tracing::warn!(node_id = %id, error = %err, "skipping sync node");
            report.skipped += 1;
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Something that can run a sync job; the scheduler's seam
#[async_trait]
pub trait SyncJob: Send + Sync {
    async fn run(&self, kind: JobKind) -> Result<SyncReport, SyncError>;
}

/// Runs jobs against the live upstream APIs with the current settings
#[derive(Clone)]
pub struct SyncJobs {
    nodes: NodeService,
    settings: SettingsHandle,
}

impl SyncJobs {
    pub fn new(nodes: NodeService, settings: SettingsHandle) -> Self {
        Self { nodes, settings }
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }
}

#[async_trait]
impl SyncJob for SyncJobs {
    async fn run(&self, kind: JobKind) -> Result<SyncReport, SyncError> {
        let settings = self.settings.snapshot().await;
        match kind {
            JobKind::Directory => {
                let client = FreshserviceClient::from_settings(&settings)?;
                directory::run(&self.nodes, &client).await
            }
            JobKind::Tickets => {
                let client = FreshserviceClient::from_settings(&settings)?;
                tickets::run(
                    &self.nodes,
                    &client,
                    settings.ticket_start_id,
                    TicketMode::Incremental,
                )
                .await
            }
            JobKind::Devices => {
                let client = DattoClient::from_settings(&settings)?;
                devices::run(&self.nodes, &client).await
            }
        }
    }
}
