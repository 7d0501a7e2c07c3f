//! KnowledgeTree Sync
//!
//! Background jobs that mirror helpdesk and RMM data into the knowledge tree:
//!
//! - **Directory**: Freshservice departments and requesters become company
//!   and user folders
//! - **Tickets**: Freshservice tickets become articles in each user's attached
//!   "Tickets" folder, so they show up in the context of everything the user owns
//! - **Devices**: Datto RMM devices become computer articles in the matched
//!   user's folder
//!
//! [`SyncScheduler`] runs the jobs on their configured intervals and on demand.

pub mod datto;
pub mod error;
pub mod freshservice;
pub mod http;
pub mod jobs;
pub mod scheduler;
pub mod settings;

pub use error::SyncError;
pub use jobs::{JobKind, SyncJob, SyncJobs, SyncReport, TicketMode};
pub use scheduler::{JobRunner, SyncScheduler};
pub use settings::{SettingsHandle, SyncIntervals, SyncSettings};
