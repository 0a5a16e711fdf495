//! Storage infrastructure: configuration files and the whitelist store.

pub mod config;
pub mod kv_store;
