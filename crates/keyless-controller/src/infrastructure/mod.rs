//! Infrastructure layer for the lock controller.
//!
//! # What lives here? (for beginners)
//!
//! Everything that touches the outside world: sockets, files and the
//! vehicle's outputs.  The application layer never imports from here; it
//! defines small ports (such as
//! [`KeyValueStore`](crate::application::whitelist::KeyValueStore)) and
//! these modules implement them.
//!
//! - [`actuation`] – drives door, trunk, horn and light outputs.
//! - [`link`] – carries payloads between keys and the controller.
//! - [`runtime`] – the Tokio task that drives the controller state machine.
//! - [`storage`] – TOML configuration and the persistent whitelist store.

pub mod actuation;
pub mod link;
pub mod runtime;
pub mod storage;
