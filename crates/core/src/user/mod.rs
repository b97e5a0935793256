//! User module

mod model;
mod repository;

pub use model::User;
pub use repository::UserRepository;
