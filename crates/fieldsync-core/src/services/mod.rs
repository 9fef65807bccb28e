//! Shared services used by the CLI and embedding applications

mod database;

pub use database::DatabaseService;
