//! Actuation infrastructure: driving the physical outputs.
//!
//! The controller never talks to GPIO directly.  The command gate produces a
//! declarative [`Action`] and the [`service::ActuationService`] hands it to an
//! [`Actuator`] implementation on a blocking worker thread.
//!
//! # Why a blocking worker? (for beginners)
//!
//! Pulsing a lock motor means "set the pin, wait 500 ms, clear the pin".
//! That wait is a plain synchronous sleep on real hardware.  Running it on
//! the async event loop would freeze link handling for the whole pulse, so
//! actuations are moved to Tokio's blocking thread pool with
//! `spawn_blocking` while the loop keeps serving events.
//!
//! # Testability
//!
//! The [`Actuator`] trait allows unit tests to substitute
//! [`mock::RecordingActuator`] and assert on exactly which outputs were
//! driven, in which order.

use std::time::Duration;

use thiserror::Error;

use crate::application::command_gate::{Action, Pattern};

pub mod mock;
pub mod service;
pub mod simulated;

/// Error type for actuation operations.
#[derive(Debug, Error, PartialEq)]
pub enum ActuationError {
    #[error("output not available: {0}")]
    UnknownOutput(String),
    #[error("driving output {output} failed: {reason}")]
    Failed { output: String, reason: String },
    #[error("actuation worker stopped unexpectedly: {0}")]
    WorkerFailed(String),
}

/// Trait abstracting the physical outputs.
///
/// Both operations are synchronous and return only once the full duration
/// has elapsed.  There is no feedback from the hardware.
pub trait Actuator: Send + Sync {
    /// Holds `output` active for `duration`.
    fn activate(&self, output: &str, duration: Duration) -> Result<(), ActuationError>;

    /// Toggles `output` on and off for `duration`.
    fn blink(&self, output: &str, duration: Duration) -> Result<(), ActuationError>;
}

/// Runs `action` against `actuator`, choosing the operation from its pattern.
pub fn perform(actuator: &dyn Actuator, action: &Action) -> Result<(), ActuationError> {
    match action.pattern {
        Pattern::Pulse => actuator.activate(&action.output, action.duration),
        Pattern::Blink => actuator.blink(&action.output, action.duration),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
