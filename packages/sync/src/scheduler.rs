//! Periodic sync scheduler
//!
//! One background task per [`JobKind`]. Each task re-reads its interval
//! from the shared settings before every wait, so interval changes made
//! through the admin API apply from the next cycle. A disabled job (interval
//! 0) is re-checked every minute.
//!
//! Runs of the same kind never overlap: a scheduled or triggered run that
//! finds the kind already running is dropped.

use crate::error::SyncError;
use crate::jobs::{JobKind, SyncJob, SyncReport};
use crate::settings::SettingsHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// How often a disabled job checks whether it was enabled
pub const DISABLED_RECHECK: Duration = Duration::from_secs(60);

/// Clears a kind's running flag when the run ends, however it ends
struct RunningGuard {
    flags: Arc<[AtomicBool; 3]>,
    index: usize,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.flags[self.index].store(false, Ordering::Release);
    }
}

/// Runs jobs with per-kind coalescing
#[derive(Clone)]
pub struct JobRunner {
    job: Arc<dyn SyncJob>,
    running: Arc<[AtomicBool; 3]>,
}

impl JobRunner {
    pub fn new(job: Arc<dyn SyncJob>) -> Self {
        Self {
            job,
            running: Arc::new([AtomicBool::new(false), AtomicBool::new(false), AtomicBool::new(false)]),
        }
    }

    pub fn is_running(&self, kind: JobKind) -> bool {
        self.running[kind.index()].load(Ordering::Acquire)
    }

    fn acquire(&self, kind: JobKind) -> Option<RunningGuard> {
        self.running[kind.index()]
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunningGuard {
                flags: self.running.clone(),
                index: kind.index(),
            })
    }

    /// Run `kind` now and wait for it
    ///
    /// Returns `None` without running if the kind is already running.
    pub async fn run(&self, kind: JobKind) -> Option<Result<SyncReport, SyncError>> {
        let guard = self.acquire(kind)?;
        let result = Self::run_logged(self.job.as_ref(), kind).await;
        drop(guard);
        Some(result)
    }

    /// Start `kind` in the background
    ///
    /// Returns `false` if the kind is already running.
    pub fn trigger(&self, kind: JobKind) -> bool {
        let Some(guard) = self.acquire(kind) else {
            tracing::info!(job = %kind, "sync already running, trigger ignored");
            return false;
        };

        let job = self.job.clone();
        tokio::spawn(async move {
            let _guard = guard;
            let _ = Self::run_logged(job.as_ref(), kind).await;
        });
        true
    }

    async fn run_logged(job: &dyn SyncJob, kind: JobKind) -> Result<SyncReport, SyncError> {
        tracing::info!(job = %kind, "sync started");
        let result = job.run(kind).await;
        match &result {
            Ok(report) => tracing::info!(
                job = %kind,
                created = report.created,
                updated = report.updated,
                skipped = report.skipped,
                "sync finished"
            ),
            Err(SyncError::MissingConfig(what)) => {
                tracing::warn!(job = %kind, missing = %what, "sync not configured, skipped")
            }
            Err(e) => tracing::error!(job = %kind, error = %e, "sync failed"),
        }
        result
    }
}

/// Owns the per-kind timer tasks
pub struct SyncScheduler {
    runner: JobRunner,
    shutdown: Vec<mpsc::Sender<()>>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncScheduler {
    /// Spawn one timer task per job kind
    pub fn start(job: Arc<dyn SyncJob>, settings: SettingsHandle) -> Self {
        let runner = JobRunner::new(job);
        let mut shutdown = Vec::new();
        let mut tasks = Vec::new();

        for kind in JobKind::ALL {
            let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
            let runner = runner.clone();
            let settings = settings.clone();

            tasks.push(tokio::spawn(async move {
                loop {
                    let interval = settings.snapshot().await.interval_for(kind);
                    let wait = interval.unwrap_or(DISABLED_RECHECK);

                    tokio::select! {
                        biased;

                        _ = shutdown_rx.recv() => {
                            tracing::debug!(job = %kind, "scheduler task shutting down");
                            break;
                        }

                        _ = tokio::time::sleep(wait) => {}
                    }

                    if interval.is_none() {
                        continue;
                    }
                    if runner.run(kind).await.is_none() {
                        tracing::info!(job = %kind, "previous run still in progress, skipping");
                    }
                }
            }));
            shutdown.push(shutdown_tx);
        }

        tracing::info!("sync scheduler started");
        Self {
            runner,
            shutdown,
            tasks,
        }
    }

    pub fn runner(&self) -> &JobRunner {
        &self.runner
    }

    /// Fire a run of `kind` now; `false` if one is already running
    pub fn trigger(&self, kind: JobKind) -> bool {
        self.runner.trigger(kind)
    }

    /// Stop the timer tasks; runs already in flight finish on their own
    pub async fn shutdown(self) {
        for tx in &self.shutdown {
            let _ = tx.send(()).await;
        }
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "scheduler task ended abnormally");
            }
        }
        tracing::info!("sync scheduler stopped");
    }
}
