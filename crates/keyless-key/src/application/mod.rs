//! Application layer for the key.
//!
//! # What is the application layer? (for beginners)
//!
//! These modules hold the key's decisions and nothing else.  They never open
//! a socket or read a sensor; the runtime hands them notifications, signal
//! samples and user commands together with the current time, and they answer
//! with the payloads to send.
//!
//! - [`key_session`] – answers challenges and tracks what the key believes
//!   about the lock.
//! - [`auto_trigger`] – turns smoothed signal strength into automatic
//!   `LOCK`/`UNLOCK` requests.
//! - [`agent`] – the single state machine combining the two.

pub mod agent;
pub mod auto_trigger;
pub mod key_session;
