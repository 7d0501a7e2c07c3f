//! Sync Error Types

use knowledgetree_core::services::{ErrorKind, NodeServiceError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Upstream API unreachable, timing out or answering with an error status
    #[error("{service} unavailable: {message}")]
    UpstreamUnavailable {
        service: &'static str,
        message: String,
    },

    /// Upstream asked us to back off
    #[error("{service} rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        service: &'static str,
        retry_after_secs: u64,
    },

    /// Credentials or endpoint not configured; the job does not run
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    /// Upstream answered with a body we could not read
    #[error("Failed to decode {service} response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    /// Writing into the tree failed
    #[error("Tree update failed: {0}")]
    Tree(#[from] NodeServiceError),
}

impl SyncError {
    pub fn upstream(service: &'static str, message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            service,
            message: message.into(),
        }
    }

    pub fn decode(service: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            service,
            message: message.into(),
        }
    }

    pub fn missing_config(what: impl Into<String>) -> Self {
        Self::MissingConfig(what.into())
    }

    /// Tree errors that only concern one record (name clash, vanished
    /// parent); the job skips the record instead of aborting
    pub fn is_record_level(&self) -> bool {
        matches!(self, Self::Tree(err) if err.kind() != ErrorKind::Internal)
    }
}
