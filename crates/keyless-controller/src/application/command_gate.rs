//! Command table and dispatch for authenticated peers.
//!
//! Each command maps to one declarative [`Action`]: which output to drive,
//! whether to pulse or blink it, and for how long.  The table is plain data
//! loaded from configuration, so changing a relay or a duration never needs
//! a code change.
//!
//! The gate also remembers the controller's belief about the lock position.
//! Only `LOCK`, `UNLOCK` and the automatic re-lock after disconnect move it.

use std::time::Duration;

use keyless_core::{Command, LockState, Notification, Request};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// How an output is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pattern {
    /// Hold the output active for the whole duration (door motors, trunk latch).
    Pulse,
    /// Toggle the output on and off until the duration has elapsed (lights, horn).
    Blink,
}

/// A single physical actuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub output: String,
    pub pattern: Pattern,
    pub duration: Duration,
}

/// What a command does and what the key is told afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBinding {
    pub action: Action,
    pub ack: String,
}

impl CommandBinding {
    pub fn new(output: &str, pattern: Pattern, duration: Duration, ack: &str) -> Self {
        Self {
            action: Action {
                output: output.to_string(),
                pattern,
                duration,
            },
            ack: ack.to_string(),
        }
    }
}

/// Declarative mapping from every command to its binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTable {
    pub lock: CommandBinding,
    pub unlock: CommandBinding,
    pub trunk: CommandBinding,
    pub locate: CommandBinding,
    pub elight: CommandBinding,
}

impl CommandTable {
    /// Looks up the binding for `command`.
    pub fn get(&self, command: Command) -> &CommandBinding {
        match command {
            Command::Lock => &self.lock,
            Command::Unlock => &self.unlock,
            Command::Trunk => &self.trunk,
            Command::Locate => &self.locate,
            Command::Elight => &self.elight,
        }
    }

    /// Replaces the binding for `command`.
    pub fn set(&mut self, command: Command, binding: CommandBinding) {
        let slot = match command {
            Command::Lock => &mut self.lock,
            Command::Unlock => &mut self.unlock,
            Command::Trunk => &mut self.trunk,
            Command::Locate => &mut self.locate,
            Command::Elight => &mut self.elight,
        };
        *slot = binding;
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self {
            lock: CommandBinding::new("door_lock", Pattern::Pulse, Duration::from_millis(500), "Door Locked"),
            unlock: CommandBinding::new("door_unlock", Pattern::Pulse, Duration::from_millis(500), "Door Unlocked"),
            trunk: CommandBinding::new("trunk", Pattern::Pulse, Duration::from_millis(1000), "Trunk Opened"),
            locate: CommandBinding::new("horn", Pattern::Blink, Duration::from_millis(3000), "Vehicle Located"),
            elight: CommandBinding::new("exterior_lights", Pattern::Blink, Duration::from_millis(5000), "Lights Flashed"),
        }
    }
}

/// Result of gating one payload from an authenticated peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Perform `action`, then send `reply`.
    Execute { command: Command, action: Action, reply: Notification },
    /// Nothing to actuate; send `INVALID_COMMAND`.
    Invalid,
}

impl Dispatch {
    /// The single notification this dispatch produces.
    pub fn reply(&self) -> Notification {
        match self {
            Dispatch::Execute { reply, .. } => reply.clone(),
            Dispatch::Invalid => Notification::InvalidCommand,
        }
    }
}

/// Command dispatcher plus the believed lock position.
#[derive(Debug, Clone, Default)]
pub struct CommandGate {
    table: CommandTable,
    lock_state: LockState,
}

impl CommandGate {
    pub fn new(table: CommandTable) -> Self {
        Self {
            table,
            lock_state: LockState::Unknown,
        }
    }

    /// Maps a command-channel payload to an action.
    ///
    /// Callers must only pass payloads from authenticated peers.
    /// `LOCK`/`UNLOCK` update the lock state; repeating one leaves the
    /// state unchanged but still actuates.
    pub fn dispatch(&mut self, payload: &str) -> Dispatch {
        let command = match Request::parse(payload) {
            Request::Command(command) => command,
            other => {
                debug!(payload = %other, "invalid command");
                return Dispatch::Invalid;
            }
        };
        let binding = self.table.get(command).clone();
        if let Some(next) = command.resulting_lock_state() {
            if next != self.lock_state {
                info!(from = ?self.lock_state, to = ?next, "lock state changed");
            }
            self.lock_state = next;
        }
        info!(%command, output = %binding.action.output, "executing command");
        Dispatch::Execute {
            command,
            action: binding.action,
            reply: Notification::Ack(binding.ack),
        }
    }

    /// Returns the LOCK action if the lock is not known to be engaged, and
    /// records the lock as engaged.
    pub fn auto_lock(&mut self) -> Option<Action> {
        if !self.lock_state.needs_locking() {
            return None;
        }
        info!(from = ?self.lock_state, "automatic re-lock");
        self.lock_state = LockState::Locked;
        Some(self.table.get(Command::Lock).action.clone())
    }

    pub fn lock_state(&self) -> LockState {
        self.lock_state
    }

    pub fn table(&self) -> &CommandTable {
        &self.table
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
