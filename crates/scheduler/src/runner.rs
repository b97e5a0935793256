//! Execution of a single task run
//!
//! A run fetches the task URL, records the listings not seen before,
//! advances the schedule and then announces the new listings. Each step is a
//! separate repository call, so a failure late in the run never undoes what
//! an earlier step committed. Nothing is retried within a run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use lw_core::item::{diff, Candidate};
use lw_core::task::Task;
use lw_core::Repository;

use crate::fetcher::Fetcher;
use crate::notifier::{format_listing, Notifier};

/// Configuration for the task runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Most notifications sent per run; further new listings are recorded
    /// as seen without being announced
    pub notify_cap: usize,
    /// A fetch still pending after this long counts as failed
    pub fetch_timeout: Duration,
    /// Deadline for delivering one notification
    pub notify_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            notify_cap: 10,
            fetch_timeout: Duration::from_secs(120),
            notify_timeout: Duration::from_secs(10),
        }
    }
}

/// Outcome of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub task_id: Uuid,
    pub executed_at: DateTime<Utc>,
    /// Candidates returned by the fetcher
    pub fetched: usize,
    pub fetch_failed: bool,
    /// Candidates not seen before
    pub new_items: usize,
    /// Records created by this run
    pub persisted: usize,
    pub notified: usize,
    pub notify_failures: usize,
    /// Next check time written back, `None` if the schedule update failed
    pub next_run_at: Option<DateTime<Utc>>,
}

/// Runs tasks against the fetcher, repository and notifier
pub struct TaskRunner {
    repo: Arc<dyn Repository>,
    fetcher: Arc<dyn Fetcher>,
    notifier: Arc<dyn Notifier>,
    config: RunnerConfig,
}

impl TaskRunner {
    pub fn new(
        repo: Arc<dyn Repository>,
        fetcher: Arc<dyn Fetcher>,
        notifier: Arc<dyn Notifier>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            repo,
            fetcher,
            notifier,
            config,
        }
    }

    /// Run the task now, with the execution time truncated to whole seconds
    pub async fn run_now(&self, task: &Task) -> RunReport {
        self.run(task, Utc::now().trunc_subsecs(0)).await
    }

    /// Run the task as if executed at `executed_at`
    pub async fn run(&self, task: &Task, executed_at: DateTime<Utc>) -> RunReport {
        let mut report = RunReport {
            task_id: task.id,
            executed_at,
            ..RunReport::default()
        };
        info!(task_id = %task.id, url = %task.url, "Starting task run");

        let fresh = self.collect_new(task, &mut report).await;
        report.new_items = fresh.len();

        let recorded = if fresh.is_empty() {
            Vec::new()
        } else {
            match self.repo.insert_items_if_absent(task.id, &fresh, executed_at).await {
                Ok(inserted) => {
                    report.persisted = inserted.len();
                    info!(task_id = %task.id, new = fresh.len(), inserted = inserted.len(), "Recorded new listings");
                    // Listings another writer recorded first are theirs to announce
                    let created: HashSet<&str> = inserted.iter().map(String::as_str).collect();
                    let owned: Vec<Candidate> = fresh
                        .into_iter()
                        .filter(|c| created.contains(c.id.as_str()))
                        .collect();
                    owned
                }
                Err(e) => {
                    error!(task_id = %task.id, error = %e, "Failed to record new listings");
                    Vec::new()
                }
            }
        };

        report.next_run_at = self.reschedule(task.id, executed_at).await;

        if !recorded.is_empty() {
            self.announce(task, &recorded, &mut report).await;
        }

        info!(
            task_id = %task.id,
            fetched = report.fetched,
            new = report.new_items,
            notified = report.notified,
            "Task run finished"
        );
        report
    }

    /// Load the seen ledger and fetch; any failure or an expired fetch
    /// deadline yields no new listings
    async fn collect_new(&self, task: &Task, report: &mut RunReport) -> Vec<Candidate> {
        let seen = match self.repo.get_seen_item_ids(task.id).await {
            Ok(seen) => seen,
            Err(e) => {
                error!(task_id = %task.id, error = %e, "Failed to load seen listings");
                return Vec::new();
            }
        };

        let limit = self.config.fetch_timeout;
        let fetched = match tokio::time::timeout(limit, self.fetcher.fetch(&task.url)).await {
            Ok(Ok(fetched)) => fetched,
            Ok(Err(e)) => {
                warn!(task_id = %task.id, error = %e, "Fetch failed, treating as empty");
                report.fetch_failed = true;
                return Vec::new();
            }
            Err(_) => {
                warn!(task_id = %task.id, timeout_secs = limit.as_secs(), "Fetch timed out, treating as empty");
                report.fetch_failed = true;
                return Vec::new();
            }
        };
        report.fetched = fetched.len();
        debug!(task_id = %task.id, fetched = fetched.len(), seen = seen.len(), "Fetched listings");

        diff(&seen, fetched)
    }

    /// Advance the schedule from the stored task. On failure the task keeps
    /// its old `next_run_at` and is picked up again by the next tick.
    async fn reschedule(&self, task_id: Uuid, executed_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let current = match self.repo.get_task(task_id).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                warn!(%task_id, "Task disappeared during run, not rescheduling");
                return None;
            }
            Err(e) => {
                error!(%task_id, error = %e, "Failed to reload task");
                return None;
            }
        };

        let next_run_at = current.next_run_after(executed_at);
        match self
            .repo
            .update_task_schedule(task_id, executed_at, next_run_at)
            .await
        {
            Ok(()) => {
                info!(%task_id, %next_run_at, "Rescheduled task");
                Some(next_run_at)
            }
            Err(e) => {
                error!(%task_id, error = %e, "Failed to update task schedule");
                None
            }
        }
    }

    async fn announce(&self, task: &Task, items: &[Candidate], report: &mut RunReport) {
        let endpoint = match self.repo.get_user_endpoint(task.user_id).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                error!(task_id = %task.id, user_id = %task.user_id, error = %e, "Cannot resolve user endpoint");
                return;
            }
        };

        if items.len() > self.config.notify_cap {
            info!(
                task_id = %task.id,
                new = items.len(),
                cap = self.config.notify_cap,
                "Notification cap reached, remaining listings stay unannounced"
            );
        }

        let limit = self.config.notify_timeout;
        for item in items.iter().take(self.config.notify_cap) {
            let message = format_listing(item);
            match tokio::time::timeout(limit, self.notifier.send(&endpoint, &message)).await {
                Ok(Ok(())) => report.notified += 1,
                Ok(Err(e)) => {
                    report.notify_failures += 1;
                    warn!(task_id = %task.id, item_id = %item.id, error = %e, "Failed to deliver notification");
                }
                Err(_) => {
                    report.notify_failures += 1;
                    warn!(task_id = %task.id, item_id = %item.id, "Notification timed out");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{candidates, set, Harness};
    use async_trait::async_trait;
    use chrono::Duration;
    use lw_core::FileStore;

    #[tokio::test]
    async fn test_first_run_dedupes_fetch_and_reschedules() {
        let harness = Harness::new().await;
        let now = Utc::now().trunc_subsecs(0);
        let task = harness.due_task(now).await;
        harness.fetcher.push_ok(candidates(&["A", "B", "A"]));

        let report = harness.runner().run(&task, now).await;

        assert_eq!(report.fetched, 3);
        assert_eq!(report.new_items, 2);
        assert_eq!(report.persisted, 2);
        assert_eq!(harness.seen(task.id).await, set(&["A", "B"]));
        assert_eq!(harness.notifier.sent_ids(), vec!["A", "B"]);

        let stored = harness.task(task.id).await;
        assert_eq!(stored.next_run_at, now + Duration::minutes(10));
        assert_eq!(stored.last_run_at, Some(now));
        assert_eq!(report.next_run_at, Some(now + Duration::minutes(10)));
    }

    #[tokio::test]
    async fn test_second_run_announces_only_new() {
        let harness = Harness::new().await;
        let now = Utc::now().trunc_subsecs(0);
        let task = harness.due_task(now).await;
        let runner = harness.runner();

        harness.fetcher.push_ok(candidates(&["A", "B", "A"]));
        runner.run(&task, now).await;

        let later = now + Duration::minutes(10);
        harness.fetcher.push_ok(candidates(&["A", "C"]));
        let report = runner.run(&task, later).await;

        assert_eq!(report.new_items, 1);
        assert_eq!(harness.notifier.sent_ids(), vec!["A", "B", "C"]);
        assert_eq!(harness.seen(task.id).await, set(&["A", "B", "C"]));
        assert_eq!(harness.task(task.id).await.next_run_at, later + Duration::minutes(10));
    }

    #[tokio::test]
    async fn test_fetch_failure_still_advances_schedule() {
        let harness = Harness::new().await;
        let now = Utc::now().trunc_subsecs(0);
        let task = harness.due_task(now).await;
        harness.fetcher.push_err("site unavailable");

        let report = harness.runner().run(&task, now).await;

        assert!(report.fetch_failed);
        assert_eq!(report.persisted, 0);
        assert!(harness.seen(task.id).await.is_empty());
        assert!(harness.notifier.sent_ids().is_empty());

        let stored = harness.task(task.id).await;
        assert_eq!(stored.next_run_at, now + Duration::minutes(10));
        assert_eq!(stored.last_run_at, Some(now));
    }

    #[tokio::test]
    async fn test_notifications_capped_but_all_recorded() {
        let harness = Harness::new().await;
        let now = Utc::now().trunc_subsecs(0);
        let task = harness.due_task(now).await;
        let ids: Vec<String> = (1..=12).map(|i| i.to_string()).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        harness.fetcher.push_ok(candidates(&id_refs));

        let report = harness.runner().run(&task, now).await;

        assert_eq!(report.persisted, 12);
        assert_eq!(report.notified, 10);
        assert_eq!(harness.notifier.sent_ids(), id_refs[..10].to_vec());
        assert_eq!(harness.seen(task.id).await.len(), 12);

        // Listings beyond the cap are never announced later
        harness.fetcher.push_ok(candidates(&id_refs));
        harness.runner().run(&task, now + Duration::minutes(10)).await;
        assert_eq!(harness.notifier.sent_ids().len(), 10);
    }

    #[tokio::test]
    async fn test_notify_failure_does_not_stop_other_items() {
        let harness = Harness::new().await;
        let now = Utc::now().trunc_subsecs(0);
        let task = harness.due_task(now).await;
        harness.notifier.fail_on("B");
        harness.fetcher.push_ok(candidates(&["A", "B", "C"]));

        let report = harness.runner().run(&task, now).await;

        assert_eq!(report.notified, 2);
        assert_eq!(report.notify_failures, 1);
        assert_eq!(harness.notifier.sent_ids(), vec!["A", "C"]);
        // The failed item is still seen and will not be announced again
        assert!(harness.seen(task.id).await.contains("B"));
        assert_eq!(harness.task(task.id).await.next_run_at, now + Duration::minutes(10));
    }

    #[tokio::test]
    async fn test_reschedule_uses_stored_interval() {
        let harness = Harness::new().await;
        let now = Utc::now().trunc_subsecs(0);
        let task = harness.due_task(now).await;
        harness.set_interval(task.id, 30).await;
        harness.fetcher.push_ok(Vec::new());

        // The in-memory copy still says 10 minutes
        let report = harness.runner().run(&task, now).await;
        assert_eq!(report.next_run_at, Some(now + Duration::minutes(30)));
    }

    #[tokio::test]
    async fn test_missing_task_is_not_rescheduled() {
        let harness = Harness::new().await;
        let now = Utc::now().trunc_subsecs(0);
        let task = harness.due_task(now).await;
        harness.delete_task(task.id).await;
        harness.fetcher.push_ok(Vec::new());

        let report = harness.runner().run(&task, now).await;
        assert_eq!(report.next_run_at, None);
    }

    #[tokio::test]
    async fn test_unknown_user_skips_notifications() {
        let harness = Harness::new().await;
        let now = Utc::now().trunc_subsecs(0);
        let mut task = harness.due_task(now).await;
        task.user_id = Uuid::new_v4();
        harness.fetcher.push_ok(candidates(&["A"]));

        let report = harness.runner().run(&task, now).await;

        assert_eq!(report.persisted, 1);
        assert_eq!(report.notified, 0);
        assert!(report.next_run_at.is_some());
    }

    #[tokio::test]
    async fn test_fetch_timeout_still_advances_schedule() {
        let harness = Harness::new().await;
        let now = Utc::now().trunc_subsecs(0);
        let task = harness.due_task(now).await;
        harness.fetcher.set_delay(std::time::Duration::from_millis(500));
        harness.fetcher.push_ok(candidates(&["A"]));

        let runner = harness.runner_with(RunnerConfig {
            fetch_timeout: std::time::Duration::from_millis(20),
            ..RunnerConfig::default()
        });
        let report = runner.run(&task, now).await;

        assert!(report.fetch_failed);
        assert_eq!(report.persisted, 0);
        assert!(harness.notifier.sent_ids().is_empty());

        let stored = harness.task(task.id).await;
        assert_eq!(stored.last_run_at, Some(now));
        assert_eq!(stored.next_run_at, now + Duration::minutes(10));
    }

    #[tokio::test]
    async fn test_notify_timeout_counts_as_failure() {
        let harness = Harness::new().await;
        let now = Utc::now().trunc_subsecs(0);
        let task = harness.due_task(now).await;
        harness.notifier.set_delay(std::time::Duration::from_millis(500));
        harness.fetcher.push_ok(candidates(&["A", "B"]));

        let runner = harness.runner_with(RunnerConfig {
            notify_timeout: std::time::Duration::from_millis(20),
            ..RunnerConfig::default()
        });
        let report = runner.run(&task, now).await;

        assert_eq!(report.notified, 0);
        assert_eq!(report.notify_failures, 2);
        assert_eq!(report.persisted, 2);
        assert_eq!(report.next_run_at, Some(now + Duration::minutes(10)));
    }

    /// Store shared with another writer that records `rival` between our
    /// diff and our insert
    struct RacingRepository {
        store: Arc<FileStore>,
        rival: Vec<Candidate>,
    }

    #[async_trait]
    impl Repository for RacingRepository {
        async fn list_due_tasks(&self, now: DateTime<Utc>) -> lw_core::Result<Vec<Task>> {
            self.store.list_due_tasks(now).await
        }

        async fn get_task(&self, id: Uuid) -> lw_core::Result<Option<Task>> {
            self.store.get_task(id).await
        }

        async fn get_seen_item_ids(&self, task_id: Uuid) -> lw_core::Result<HashSet<String>> {
            self.store.get_seen_item_ids(task_id).await
        }

        async fn insert_items_if_absent(
            &self,
            task_id: Uuid,
            items: &[Candidate],
            observed_at: DateTime<Utc>,
        ) -> lw_core::Result<Vec<String>> {
            self.store
                .insert_items_if_absent(task_id, &self.rival, observed_at)
                .await?;
            self.store
                .insert_items_if_absent(task_id, items, observed_at)
                .await
        }

        async fn update_task_schedule(
            &self,
            task_id: Uuid,
            last_run_at: DateTime<Utc>,
            next_run_at: DateTime<Utc>,
        ) -> lw_core::Result<()> {
            self.store
                .update_task_schedule(task_id, last_run_at, next_run_at)
                .await
        }

        async fn get_user_endpoint(&self, user_id: Uuid) -> lw_core::Result<String> {
            self.store.get_user_endpoint(user_id).await
        }
    }

    #[tokio::test]
    async fn test_only_created_records_are_announced() {
        let harness = Harness::new().await;
        let now = Utc::now().trunc_subsecs(0);
        let task = harness.due_task(now).await;
        harness.fetcher.push_ok(candidates(&["A", "B", "C"]));

        let repo = RacingRepository {
            store: Arc::clone(&harness.store),
            rival: candidates(&["B"]),
        };
        let runner = TaskRunner::new(
            Arc::new(repo) as Arc<dyn Repository>,
            Arc::clone(&harness.fetcher) as Arc<dyn Fetcher>,
            Arc::clone(&harness.notifier) as Arc<dyn Notifier>,
            RunnerConfig::default(),
        );
        let report = runner.run(&task, now).await;

        assert_eq!(report.new_items, 3);
        assert_eq!(report.persisted, 2);
        assert_eq!(harness.notifier.sent_ids(), vec!["A", "C"]);
        assert_eq!(harness.seen(task.id).await, set(&["A", "B", "C"]));
    }
}
