//! Application layer use cases for the lock controller.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure business rules in `keyless-core`) and the infrastructure
//! (sockets, GPIO, files).
//!
//! Everything here is a plain, synchronous state machine.  Time is passed in
//! as an [`std::time::Instant`] argument instead of being read from the
//! clock, so tests can jump five minutes ahead without sleeping.
//!
//! # Sub-modules
//!
//! - **`lockout`** – Counts failed authentication attempts per peer and
//!   temporarily bans peers that fail too often.
//!
//! - **`whitelist`** – The persisted set of peers that have proven they hold
//!   the shared secret, plus the [`whitelist::KeyValueStore`] port it is
//!   saved through.
//!
//! - **`access_control`** – Owns the per-connection authentication state,
//!   the outstanding challenges, the lockout tracker and the whitelist.
//!
//! - **`command_gate`** – Maps command keywords to declarative actuation
//!   actions and tracks the believed lock position.
//!
//! - **`controller`** – The single event-driven state machine tying the
//!   pieces together.  Link events go in, effects (send, disconnect,
//!   actuate) come out.

pub mod access_control;
pub mod command_gate;
pub mod controller;
pub mod lockout;
pub mod whitelist;
