//! Domain entities for keyless access control.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! The innermost layer of the application.  Domain code has **no** imports
//! from radio stacks, sockets, file systems, or GPIO drivers, so it can be
//! compiled and tested on any machine.  The controller and key crates depend
//! on these types; the types never depend on them.

/// Command vocabulary accepted by the controller.
pub mod command;

/// The controller's belief about the physical lock position.
pub mod lock_state;

/// Stable identifiers of remote devices.
pub mod peer;

/// Signal-strength smoothing and hysteresis.
///
/// See [`proximity::ProximityFilter`] for the main type.
pub mod proximity;
