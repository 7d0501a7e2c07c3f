//! Sync Settings
//!
//! Credentials and schedules for the sync jobs, read from the environment
//! (optionally via a `.env` file). The running process keeps one shared
//! [`SettingsHandle`]; the admin API updates intervals through it and every
//! job run takes a fresh snapshot.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::jobs::JobKind;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TICKET_START_ID: u64 = 550;

/// Job schedule, in minutes; `0` disables the job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncIntervals {
    pub freshservice_interval_minutes: u64,
    pub datto_interval_minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub freshservice_domain: Option<String>,
    pub freshservice_api_key: Option<String>,
    pub datto_api_endpoint: Option<String>,
    pub datto_api_key: Option<String>,
    pub datto_api_secret: Option<String>,
    pub intervals: SyncIntervals,
    pub request_timeout: Duration,
    pub ticket_start_id: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            freshservice_domain: None,
            freshservice_api_key: None,
            datto_api_endpoint: None,
            datto_api_key: None,
            datto_api_secret: None,
            intervals: SyncIntervals::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            ticket_start_id: DEFAULT_TICKET_START_ID,
        }
    }
}

impl SyncSettings {
    /// Read settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let number = |key: &str, default: u64| match text(key) {
            None => default,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(key, value = %raw, default, "ignoring non-numeric setting");
                default
            }),
        };

        Self {
            freshservice_domain: text("FRESHSERVICE_DOMAIN"),
            freshservice_api_key: text("FRESHSERVICE_API_KEY"),
            datto_api_endpoint: text("DATTO_API_ENDPOINT"),
            datto_api_key: text("DATTO_API_KEY"),
            datto_api_secret: text("DATTO_API_SECRET"),
            intervals: SyncIntervals {
                freshservice_interval_minutes: number("FRESHSERVICE_SYNC_INTERVAL_MINUTES", 0),
                datto_interval_minutes: number("DATTO_SYNC_INTERVAL_MINUTES", 0),
            },
            request_timeout: Duration::from_secs(number(
                "SYNC_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            ticket_start_id: number("TICKET_START_ID", DEFAULT_TICKET_START_ID),
        }
    }

    pub fn freshservice_configured(&self) -> bool {
        self.freshservice_domain.is_some() && self.freshservice_api_key.is_some()
    }

    pub fn datto_configured(&self) -> bool {
        self.datto_api_endpoint.is_some()
            && self.datto_api_key.is_some()
            && self.datto_api_secret.is_some()
    }

    /// How long to wait between scheduled runs of `kind`; `None` when disabled
    pub fn interval_for(&self, kind: JobKind) -> Option<Duration> {
        let minutes = match kind {
            JobKind::Directory | JobKind::Tickets => self.intervals.freshservice_interval_minutes,
            JobKind::Devices => self.intervals.datto_interval_minutes,
        };
        (minutes > 0).then(|| Duration::from_secs(minutes.saturating_mul(60)))
    }
}

/// Process-wide shared settings
#[derive(Debug, Clone, Default)]
pub struct SettingsHandle {
    inner: Arc<RwLock<SyncSettings>>,
}

impl SettingsHandle {
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Copy of the current settings
    pub async fn snapshot(&self) -> SyncSettings {
        self.inner.read().await.clone()
    }

    pub async fn intervals(&self) -> SyncIntervals {
        self.inner.read().await.intervals
    }

    pub async fn set_intervals(&self, intervals: SyncIntervals) {
        self.inner.write().await.intervals = intervals;
        tracing::info!(
            freshservice_minutes = intervals.freshservice_interval_minutes,
            datto_minutes = intervals.datto_interval_minutes,
            "sync intervals updated"
        );
    }

    /// Apply an arbitrary change
    pub async fn update<F>(&self, change: F)
    where
        F: FnOnce(&mut SyncSettings),
    {
        change(&mut *self.inner.write().await);
    }

    /// Re-read `.env` and the environment, replacing every setting
    pub async fn reload(&self) {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!(error = %e, "no .env file reloaded");
        }
        *self.inner.write().await = SyncSettings::from_env();
        tracing::info!("sync settings reloaded from environment");
    }
}
