//! Scheduler - periodic execution of listing watch tasks
//!
//! This crate polls the repository for due tasks and runs each of them at
//! most once at a time: fetch the task URL, record unseen listings, advance
//! the schedule and notify the task owner.

mod error;
mod fetcher;
mod guard;
mod notifier;
mod runner;
mod scheduler;

#[cfg(test)]
mod test_support;

pub use error::{Result, SchedulerError};
pub use fetcher::{Fetcher, HttpFetcher};
pub use guard::{ConcurrencyGuard, RunSlot};
pub use notifier::{format_listing, Notifier, TelegramNotifier};
pub use runner::{RunReport, RunnerConfig, TaskRunner};
pub use scheduler::{Scheduler, SchedulerConfig, TickReport};
