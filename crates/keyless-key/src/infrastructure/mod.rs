//! Infrastructure layer for the key.
//!
//! # What lives here? (for beginners)
//!
//! The parts of the key that talk to the outside world.  The application
//! layer decides; these modules carry the decisions out.
//!
//! - [`console`] – user commands and injected readings from stdin.
//! - [`network`] – the reconnecting link to the controller.
//! - [`runtime`] – the Tokio loop that feeds the agent and sends its output.
//! - [`signal`] – signal-strength sources.
//! - [`storage`] – TOML configuration.

pub mod console;
pub mod network;
pub mod runtime;
pub mod signal;
pub mod storage;
