//! Test doubles shared by the runner and scheduler tests

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use lw_core::item::Candidate;
use lw_core::task::{Task, TaskChanges, TaskRepository};
use lw_core::user::{User, UserRepository};
use lw_core::{FileStore, Repository};

use crate::error::{Result, SchedulerError};
use crate::fetcher::Fetcher;
use crate::notifier::Notifier;
use crate::runner::{RunnerConfig, TaskRunner};

pub fn candidates(ids: &[&str]) -> Vec<Candidate> {
    ids.iter()
        .map(|id| {
            Candidate::new(*id, format!("listing {id}"), format!("https://site.test/item_{id}"))
                .with_price("1000")
        })
        .collect()
}

pub fn set(ids: &[&str]) -> HashSet<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

/// Fetcher replaying scripted results; an empty script yields no listings
#[derive(Default)]
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<std::result::Result<Vec<Candidate>, String>>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn push_ok(&self, items: Vec<Candidate>) {
        self.script.lock().unwrap().push_back(Ok(items));
    }

    pub fn push_err(&self, message: &str) {
        self.script.lock().unwrap().push_back(Err(message.to_string()));
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<Candidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match next {
            Some(Ok(items)) => Ok(items),
            Some(Err(message)) => Err(SchedulerError::fetch(message)),
            None => Ok(Vec::new()),
        }
    }
}

/// Notifier recording delivered messages
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail_on: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
}

impl RecordingNotifier {
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Fail delivery of the listing with this id
    pub fn fail_on(&self, id: &str) {
        self.fail_on.lock().unwrap().insert(id.to_string());
    }

    /// Ids of the announced listings, in delivery order
    pub fn sent_ids(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, message)| message.rsplit("/item_").next().map(str::to_string))
            .collect()
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(e, _)| e.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, endpoint: &str, message: &str) -> Result<()> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .fail_on
            .lock()
            .unwrap()
            .iter()
            .any(|id| message.ends_with(&format!("/item_{id}")));
        if failing {
            return Err(SchedulerError::notify("chat unavailable"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((endpoint.to_string(), message.to_string()));
        Ok(())
    }
}

/// A file store in a temp dir with one registered user and scripted adapters
pub struct Harness {
    pub store: Arc<FileStore>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub notifier: Arc<RecordingNotifier>,
    pub user: User,
    _temp: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(FileStore::new(temp.path().join("watch.json")).await.unwrap());
        let user = store.upsert_user("100500", Some("tester".to_string())).await.unwrap();
        Self {
            store,
            fetcher: Arc::new(ScriptedFetcher::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            user,
            _temp: temp,
        }
    }

    pub fn runner(&self) -> TaskRunner {
        self.runner_with(RunnerConfig::default())
    }

    pub fn runner_with(&self, config: RunnerConfig) -> TaskRunner {
        TaskRunner::new(
            Arc::clone(&self.store) as Arc<dyn Repository>,
            Arc::clone(&self.fetcher) as Arc<dyn Fetcher>,
            Arc::clone(&self.notifier) as Arc<dyn Notifier>,
            config,
        )
    }

    /// Store an active task with a 10 minute interval, due since a minute
    pub async fn due_task(&self, now: DateTime<Utc>) -> Task {
        let task = Task::new(self.user.id, "Flats", "https://site.test/flats")
            .with_interval(10)
            .with_next_run_at(now - ChronoDuration::minutes(1))
            .with_end_date(now + ChronoDuration::days(5));
        self.store.create(task).await.unwrap()
    }

    pub async fn task(&self, id: Uuid) -> Task {
        self.store.get_task(id).await.unwrap().unwrap()
    }

    pub async fn seen(&self, id: Uuid) -> HashSet<String> {
        self.store.get_seen_item_ids(id).await.unwrap()
    }

    pub async fn set_interval(&self, id: Uuid, minutes: u32) {
        self.store
            .apply_changes(
                id,
                TaskChanges {
                    interval_minutes: Some(minutes),
                    ..TaskChanges::default()
                },
            )
            .await
            .unwrap();
    }

    pub async fn delete_task(&self, id: Uuid) {
        assert!(self.store.delete(id).await.unwrap());
    }
}
