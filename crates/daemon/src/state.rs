//! Application state

use std::sync::Arc;

use lw_core::task::{TaskLimits, TaskManager};
use lw_core::FileStore;
use lw_scheduler::ConcurrencyGuard;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    manager: TaskManager<FileStore>,
    guard: Arc<ConcurrencyGuard>,
}

impl AppState {
    pub fn new(store: Arc<FileStore>, limits: TaskLimits, guard: Arc<ConcurrencyGuard>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                manager: TaskManager::new(store, limits),
                guard,
            }),
        }
    }

    pub fn manager(&self) -> &TaskManager<FileStore> {
        &self.inner.manager
    }

    /// Guard shared with the scheduler, used to report running tasks
    pub fn guard(&self) -> &ConcurrencyGuard {
        &self.inner.guard
    }
}
