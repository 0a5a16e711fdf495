//! # keyless-core
//!
//! Shared library for keyless access control containing the text payload
//! codec, the challenge-response primitives, and the proximity filter.
//!
//! This crate is used by both the lock controller and the key applications.
//! It has zero dependencies on radios, sockets, or GPIO.  The only file
//! access is the shared TOML config helper in [`config_file`].
//!
//! # Architecture overview (for beginners)
//!
//! A fixed *controller* sits in the vehicle and drives the lock motors.  A
//! mobile *key* connects to it over a short-range link.  Before the controller
//! executes anything, the key has to prove that it knows a shared secret by
//! answering a random challenge with an HMAC digest.  The key also watches
//! the signal strength of the link and locks or unlocks on its own when the
//! holder walks away or comes back.
//!
//! This crate (`keyless-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – The plain-text payloads that travel over the link
//!   (`LOCK`, `RESP:<hex>`, `CHALLENGE:<hex>`, `AUTH_OK`, …) and the HMAC
//!   challenge helpers both sides use to produce and check digests.
//!
//! - **`domain`** – Pure business types: peer identities, the command
//!   vocabulary, the lock position, and the median/hysteresis proximity
//!   filter.
//!
//! - **`config_file`** – Locating, loading and saving the TOML settings
//!   file each binary reads at startup.

pub mod config_file;
pub mod domain;
pub mod protocol;

pub use domain::command::Command;
pub use domain::lock_state::LockState;
pub use domain::peer::PeerIdentity;
pub use domain::proximity::{ProximityError, ProximityFilter, ProximityState, RssiWindow, Thresholds};
pub use protocol::challenge::{AuthError, Nonce, SharedSecret};
pub use protocol::payload::{Notification, ProtocolError, Request};
