//! Storage infrastructure: the key's TOML configuration.

pub mod config;
