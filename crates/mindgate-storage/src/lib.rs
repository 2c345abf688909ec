//! Mindgate Storage Layer
//!
//! SQLite-backed persistence for the configured rules and the gate settings.
//! Runtime tab/window state is never stored here.

mod database;
mod error;
mod migrations;
mod rules;
mod settings;

pub use database::Database;
pub use error::StorageError;
pub use rules::RuleRecord;

pub type Result<T> = std::result::Result<T, StorageError>;
