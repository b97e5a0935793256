//! Single-flight registry of running tasks

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

/// Tracks which tasks are executing so that a task never runs twice at once.
///
/// Membership is checked and updated under one lock, so for any task id at
/// most one holder exists between `try_acquire` and `release`.
#[derive(Debug, Default)]
pub struct ConcurrencyGuard {
    running: Mutex<HashSet<Uuid>>,
}

impl ConcurrencyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        // The set stays consistent even if a holder panicked
        self.running.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mark the task as running. Returns `false` if it already is.
    pub fn try_acquire(&self, task_id: Uuid) -> bool {
        self.lock().insert(task_id)
    }

    /// Mark the task as no longer running
    pub fn release(&self, task_id: Uuid) {
        self.lock().remove(&task_id);
    }

    /// Acquire a slot that is released when dropped
    pub fn claim(self: &Arc<Self>, task_id: Uuid) -> Option<RunSlot> {
        self.try_acquire(task_id).then(|| RunSlot {
            guard: Arc::clone(self),
            task_id,
        })
    }

    pub fn is_running(&self, task_id: Uuid) -> bool {
        self.lock().contains(&task_id)
    }

    /// Number of tasks currently executing
    pub fn running(&self) -> usize {
        self.lock().len()
    }
}

/// A held guard entry. Dropping it releases the task, whichever way the run
/// ended.
#[derive(Debug)]
pub struct RunSlot {
    guard: Arc<ConcurrencyGuard>,
    task_id: Uuid,
}

impl Drop for RunSlot {
    fn drop(&mut self) {
        self.guard.release(self.task_id);
    }
}
