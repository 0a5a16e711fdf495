//! The key's half of the challenge-response exchange.
//!
//! A session lives for one connection.  It answers every `CHALLENGE:` with
//! `RESP:<hmac>`, remembers whether the controller accepted the answer, and
//! keeps the key's belief about the lock position up to date from the ack
//! texts the controller sends back.
//!
//! The key never sees the lock motor, so the belief is only as good as the
//! acks: it starts as [`LockState::Unknown`] on every connection.

use keyless_core::{AuthError, Command, LockState, Notification, Request, SharedSecret};
use tracing::{debug, info, warn};

/// Ack strings that reveal the lock position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckTexts {
    pub locked: String,
    pub unlocked: String,
}

impl Default for AckTexts {
    fn default() -> Self {
        Self {
            locked: "Door Locked".to_string(),
            unlocked: "Door Unlocked".to_string(),
        }
    }
}

/// What a notification changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Send this reply to the controller.
    Respond(Request),
    /// `AUTH_OK` arrived.
    Authenticated,
    /// `AUTH_FAIL` arrived.
    Rejected,
    /// An ack moved the believed lock position.
    LockState(LockState),
    /// Any other ack.
    Acknowledged(String),
    /// The controller did not recognize the last command.
    InvalidCommand,
}

#[derive(Debug)]
pub struct KeySession {
    secret: SharedSecret,
    acks: AckTexts,
    authenticated: bool,
    lock_state: LockState,
    manual_override: bool,
}

impl KeySession {
    pub fn new(secret: SharedSecret, acks: AckTexts) -> Self {
        Self {
            secret,
            acks,
            authenticated: false,
            lock_state: LockState::Unknown,
            manual_override: false,
        }
    }

    /// Applies one controller notification.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the digest cannot be computed.
    pub fn on_notification(&mut self, notification: &Notification) -> Result<SessionUpdate, AuthError> {
        let update = match notification {
            Notification::Challenge(nonce) => {
                // A new challenge means the controller no longer treats us as authenticated.
                self.authenticated = false;
                let digest = self.secret.respond(nonce)?;
                debug!("answering challenge");
                SessionUpdate::Respond(Request::Response(digest))
            }
            Notification::AuthOk => {
                info!("authenticated");
                self.authenticated = true;
                self.manual_override = false;
                SessionUpdate::Authenticated
            }
            Notification::AuthFail => {
                warn!("controller rejected our response");
                self.authenticated = false;
                SessionUpdate::Rejected
            }
            Notification::Ack(text) if *text == self.acks.locked => {
                self.lock_state = LockState::Locked;
                SessionUpdate::LockState(LockState::Locked)
            }
            Notification::Ack(text) if *text == self.acks.unlocked => {
                self.lock_state = LockState::Unlocked;
                SessionUpdate::LockState(LockState::Unlocked)
            }
            Notification::Ack(text) => SessionUpdate::Acknowledged(text.clone()),
            Notification::InvalidCommand => {
                warn!("controller answered INVALID_COMMAND");
                SessionUpdate::InvalidCommand
            }
        };
        Ok(update)
    }

    /// A command typed by the user.
    ///
    /// Returns `None` before authentication; nothing is queued.  A manual
    /// `LOCK` suppresses automatic unlocking until a manual `UNLOCK` or the
    /// next successful authentication.
    pub fn manual(&mut self, command: Command) -> Option<Request> {
        if !self.authenticated {
            warn!(%command, "not authenticated; command dropped");
            return None;
        }
        match command {
            Command::Lock => self.manual_override = true,
            Command::Unlock => self.manual_override = false,
            _ => {}
        }
        Some(Request::Command(command))
    }

    /// Forgets everything tied to the connection that just closed.
    pub fn reset(&mut self) {
        self.authenticated = false;
        self.lock_state = LockState::Unknown;
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn lock_state(&self) -> LockState {
        self.lock_state
    }

    pub fn manual_override(&self) -> bool {
        self.manual_override
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
