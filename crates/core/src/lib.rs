//! Core library for listing watch
//!
//! This crate contains the domain model and storage, including:
//! - Tasks, seen items and users
//! - Deduplication of fetched listings
//! - The storage interfaces and a JSON file store
//! - Task management for the front-end

pub mod error;
mod file_store;
pub mod item;
pub mod repository;
pub mod task;
pub mod user;

pub use error::Error;
pub use file_store::FileStore;
pub use repository::Repository;
pub type Result<T> = std::result::Result<T, Error>;
