//! Browser and HTTP service for hierarchical document databases.

pub mod api;
pub mod config;
pub mod console;
