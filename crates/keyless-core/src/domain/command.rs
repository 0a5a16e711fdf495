//! Command vocabulary accepted by the controller.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::lock_state::LockState;

/// A command a key may ask the controller to execute.
///
/// Keywords are matched case-insensitively on the wire (`lock`, `Lock` and
/// `LOCK` are the same command) and always written back in upper case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Lock,
    Unlock,
    Trunk,
    Locate,
    Elight,
}

impl Command {
    /// Every command, in wire-documentation order.
    pub const ALL: [Command; 5] = [
        Command::Lock,
        Command::Unlock,
        Command::Trunk,
        Command::Locate,
        Command::Elight,
    ];

    /// Upper-case wire keyword.
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Lock => "LOCK",
            Command::Unlock => "UNLOCK",
            Command::Trunk => "TRUNK",
            Command::Locate => "LOCATE",
            Command::Elight => "ELIGHT",
        }
    }

    /// The lock position this command leaves behind, if it changes it at all.
    pub fn resulting_lock_state(self) -> Option<LockState> {
        match self {
            Command::Lock => Some(LockState::Locked),
            Command::Unlock => Some(LockState::Unlocked),
            Command::Trunk | Command::Locate | Command::Elight => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when text is not one of the five command keywords.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown command: {0:?}")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let keyword = s.trim();
        Command::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(keyword))
            .ok_or_else(|| UnknownCommand(keyword.to_string()))
    }
}
