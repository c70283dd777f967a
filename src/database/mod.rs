//! Database module exports.

pub mod models;
mod repository;
mod sqlite;

pub use repository::{EntryRepository, KnowledgeStats};
pub use sqlite::KnowledgeDb;
