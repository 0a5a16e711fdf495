//! Lock position as believed by the controller (and mirrored by the key).

use serde::{Deserialize, Serialize};

/// Belief about the physical lock position.
///
/// There is no sensor feedback: the value is only ever changed by a
/// successfully executed `LOCK`/`UNLOCK` or by the automatic re-lock that
/// follows a disconnect.  `Unknown` is the state after power-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LockState {
    #[default]
    Unknown,
    Locked,
    Unlocked,
}

impl LockState {
    /// `true` unless the lock is known to be engaged.
    pub fn needs_locking(self) -> bool {
        self != LockState::Locked
    }
}
