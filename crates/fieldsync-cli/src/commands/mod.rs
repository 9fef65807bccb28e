pub mod common;
pub mod config;
pub mod connection;
pub mod entries;
pub mod notes;
pub mod projects;
pub mod records;
pub mod status;
pub mod sync;
