//! Item module
//!
//! Seen listings and the candidates a fetch produces.

mod dedup;
mod model;

pub use dedup::diff;
pub use model::*;
