//! Polling loop that starts due task runs

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use lw_core::Repository;

use crate::guard::ConcurrencyGuard;
use crate::runner::{RunReport, TaskRunner};

/// Configuration for the scheduler loop
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Pause between the end of one tick and the start of the next
    pub poll_interval: Duration,
    /// Most runs executing at the same time
    pub max_concurrent_runs: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            max_concurrent_runs: 4,
        }
    }
}

/// Summary of one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tasks listed as due
    pub due: usize,
    pub started: usize,
    /// Due tasks skipped because a run was already in flight
    pub skipped: usize,
    pub completed: usize,
    /// Runs that panicked
    pub abandoned: usize,
}

/// Drives the polling cadence and fans out due tasks
pub struct Scheduler {
    repo: Arc<dyn Repository>,
    runner: Arc<TaskRunner>,
    guard: Arc<ConcurrencyGuard>,
    permits: Arc<Semaphore>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        repo: Arc<dyn Repository>,
        runner: Arc<TaskRunner>,
        guard: Arc<ConcurrencyGuard>,
        config: SchedulerConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_runs.max(1)));
        Self {
            repo,
            runner,
            guard,
            permits,
            config,
        }
    }

    pub fn guard(&self) -> &Arc<ConcurrencyGuard> {
        &self.guard
    }

    /// Poll forever
    pub async fn run(&self) {
        self.run_until(std::future::pending::<()>()).await;
    }

    /// Poll until `shutdown` resolves. Shutdown is observed between ticks; a
    /// tick in progress always completes.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        info!(
            poll_secs = self.config.poll_interval.as_secs(),
            max_concurrent_runs = self.config.max_concurrent_runs,
            "Scheduler started"
        );

        loop {
            let report = self.tick().await;
            if report.due > 0 {
                info!(
                    due = report.due,
                    started = report.started,
                    skipped = report.skipped,
                    completed = report.completed,
                    abandoned = report.abandoned,
                    "Tick finished"
                );
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!("Scheduler stopped");
    }

    /// List due tasks, run every one that is not already running and wait
    /// for all started runs.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        let due = match self.repo.list_due_tasks(Utc::now()).await {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "Failed to list due tasks");
                return report;
            }
        };
        report.due = due.len();
        debug!(due = due.len(), "Listed due tasks");

        let mut runs: JoinSet<Option<RunReport>> = JoinSet::new();
        for task in due {
            // Claimed before waiting for a permit, so a queued task counts
            // as in flight
            let Some(slot) = self.guard.claim(task.id) else {
                debug!(task_id = %task.id, "Task already running, skipping");
                report.skipped += 1;
                continue;
            };

            // Never cancelled: a started run always reaches its reschedule step
            let runner = Arc::clone(&self.runner);
            let permits = Arc::clone(&self.permits);
            runs.spawn(async move {
                let _slot = slot;
                let Ok(_permit) = permits.acquire_owned().await else {
                    warn!(task_id = %task.id, "Run limiter closed, skipping task");
                    return None;
                };
                Some(runner.run_now(&task).await)
            });
            report.started += 1;
        }

        while let Some(joined) = runs.join_next().await {
            match joined {
                Ok(Some(_)) => report.completed += 1,
                Ok(None) => report.abandoned += 1,
                Err(e) => {
                    error!(error = %e, "Task run panicked");
                    report.abandoned += 1;
                }
            }
        }

        report
    }
}
