//! Automatic `LOCK`/`UNLOCK` from smoothed signal strength.
//!
//! Each raw sample goes into a [`ProximityFilter`].  The trigger compares the
//! filter's median against the two thresholds and the key's current belief
//! about the lock:
//!
//! | Smoothed signal     | Believed lock state    | Override | Fires    |
//! |---------------------|------------------------|----------|----------|
//! | `> unlock`          | `Unknown` or `Locked`  | off      | `UNLOCK` |
//! | `< lock`            | `Unlocked`             | any      | `LOCK`   |
//! | between (inclusive) | any                    | any      | nothing  |
//!
//! After anything fires, evaluation is paused for the confirmation delay so
//! a value hovering at a threshold cannot produce a burst of commands.

use std::time::{Duration, Instant};

use keyless_core::{Command, LockState, ProximityFilter, ProximityState};
use tracing::info;

/// Pause after a trigger before the next evaluation.
pub const DEFAULT_CONFIRMATION_DELAY: Duration = Duration::from_secs(2);

/// What the trigger needs to know about the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerContext {
    pub lock_state: LockState,
    /// Set by a manual `LOCK`; blocks automatic unlocking only.
    pub manual_override: bool,
}

#[derive(Debug, Clone)]
pub struct AutoTrigger {
    filter: ProximityFilter,
    confirmation_delay: Duration,
    last_fired: Option<Instant>,
}

impl AutoTrigger {
    pub fn new(filter: ProximityFilter, confirmation_delay: Duration) -> Self {
        Self {
            filter,
            confirmation_delay,
            last_fired: None,
        }
    }

    /// Adds a sample without evaluating.
    pub fn record(&mut self, rssi: i16) -> ProximityState {
        self.filter.observe(rssi)
    }

    /// Adds a sample, then evaluates.
    pub fn observe(&mut self, rssi: i16, ctx: TriggerContext, now: Instant) -> Option<Command> {
        self.record(rssi);
        self.evaluate(ctx, now)
    }

    /// Decides whether to fire with the samples seen so far.
    pub fn evaluate(&mut self, ctx: TriggerContext, now: Instant) -> Option<Command> {
        if self.cooling_down(now) {
            return None;
        }
        let smoothed = self.filter.smoothed()?;
        let thresholds = self.filter.thresholds();

        let command = if smoothed > thresholds.unlock()
            && matches!(ctx.lock_state, LockState::Unknown | LockState::Locked)
            && !ctx.manual_override
        {
            Command::Unlock
        } else if smoothed < thresholds.lock() && ctx.lock_state == LockState::Unlocked {
            Command::Lock
        } else {
            return None;
        };

        info!(smoothed, %command, "proximity trigger");
        self.last_fired = Some(now);
        Some(command)
    }

    /// `true` while the confirmation delay after the last trigger is running.
    pub fn cooling_down(&self, now: Instant) -> bool {
        self.last_fired
            .is_some_and(|at| now.saturating_duration_since(at) < self.confirmation_delay)
    }

    pub fn proximity(&self) -> ProximityState {
        self.filter.state()
    }

    pub fn smoothed(&self) -> Option<i16> {
        self.filter.smoothed()
    }

    /// Drops all samples and the cooldown; used when the link goes away.
    pub fn reset(&mut self) {
        self.filter.reset();
        self.last_fired = None;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
