//! CLI command implementations.

pub mod config;
pub mod init;
pub mod list;
pub mod project;
pub mod query;
pub mod remove;
pub mod set;
pub mod shape;
pub mod version;
