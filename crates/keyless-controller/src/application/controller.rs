//! The controller state machine.
//!
//! All link activity reaches the controller as one of five tagged
//! [`Event`]s and is handled by a single [`Controller::handle`] entry point.
//! Handling never performs I/O.  Instead it returns a list of [`Effect`]s
//! (send a notification, drop a connection, drive an output) that the
//! runtime in `main.rs` carries out.
//!
//! # Why return effects instead of doing the work? (for beginners)
//!
//! Because every handler is a plain function of `(state, event, now)`, the
//! whole protocol can be exercised in unit tests with no sockets, no GPIO and
//! no sleeping.  The runtime stays a thin loop:
//!
//! ```text
//! link task ──Event──▶ mpsc ──▶ Controller::handle ──Vec<Effect>──▶ runtime
//!                                     ▲                              │
//!                          tick(now) ─┘          send / disconnect / actuate
//! ```
//!
//! [`Controller::tick`] drives the time-based work: the lockout sweep and
//! the delayed re-lock after the last authenticated key leaves.

use std::time::{Duration, Instant};

use keyless_core::{LockState, Notification, PeerIdentity, Request};
use tracing::{debug, info};

use crate::application::access_control::{
    AccessControl, AuthState, LinkDecision, Reissue, ResponseOutcome,
};
use crate::application::command_gate::{Action, CommandGate, Dispatch};
use crate::application::lockout::FailureOutcome;

pub const DEFAULT_AUTO_LOCK_GRACE: Duration = Duration::from_secs(3);

/// Everything the link layer can tell the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Pairing succeeded; the peer has an encrypted link.
    LinkAuthenticated { peer: PeerIdentity },
    /// Pairing failed (wrong passkey).
    LinkFailed { peer: PeerIdentity },
    /// `RESP:<digest>` arrived on the command channel.
    ResponseReceived { peer: PeerIdentity, digest: String },
    /// Any other payload arrived on the command channel.
    CommandReceived { peer: PeerIdentity, payload: String },
    /// The connection is gone.
    Disconnected { peer: PeerIdentity },
}

impl Event {
    /// Classifies one command-channel payload from `peer`.
    pub fn from_payload(peer: PeerIdentity, payload: &str) -> Self {
        match Request::parse(payload) {
            Request::Response(digest) => Event::ResponseReceived { peer, digest },
            _ => Event::CommandReceived {
                peer,
                payload: payload.trim().to_string(),
            },
        }
    }
}

/// Work the runtime must perform on the controller's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Send { peer: PeerIdentity, notification: Notification },
    Disconnect { peer: PeerIdentity },
    Actuate(Action),
}

/// Single owner of all controller state.
#[derive(Debug)]
pub struct Controller {
    access: AccessControl,
    gate: CommandGate,
    grace: Duration,
    auto_lock_at: Option<Instant>,
}

impl Controller {
    pub fn new(access: AccessControl, gate: CommandGate, grace: Duration) -> Self {
        Self {
            access,
            gate,
            grace,
            auto_lock_at: None,
        }
    }

    /// Handles one event to completion.
    pub fn handle(&mut self, event: Event, now: Instant) -> Vec<Effect> {
        match event {
            Event::LinkAuthenticated { peer } => self.on_link_authenticated(peer, now),
            Event::LinkFailed { peer } => self.on_link_failed(peer, now),
            Event::ResponseReceived { peer, digest } => self.on_response(peer, &digest, now),
            Event::CommandReceived { peer, payload } => self.on_command(peer, &payload, now),
            Event::Disconnected { peer } => self.on_disconnected(peer, now),
        }
    }

    /// Time-driven work: lockout sweep and the delayed automatic re-lock.
    pub fn tick(&mut self, now: Instant) -> Vec<Effect> {
        self.access.sweep(now);

        let Some(deadline) = self.auto_lock_at else {
            return Vec::new();
        };
        if now < deadline {
            return Vec::new();
        }
        self.auto_lock_at = None;
        if self.access.authenticated_count() > 0 {
            return Vec::new();
        }
        self.gate.auto_lock().map(Effect::Actuate).into_iter().collect()
    }

    /// When the pending automatic re-lock fires, if one is scheduled.
    pub fn auto_lock_deadline(&self) -> Option<Instant> {
        self.auto_lock_at
    }

    pub fn lock_state(&self) -> LockState {
        self.gate.lock_state()
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    // ── Handlers ──────────────────────────────────────────────────────────────

    fn on_link_authenticated(&mut self, peer: PeerIdentity, now: Instant) -> Vec<Effect> {
        match self.access.on_link_authenticated(&peer, now) {
            LinkDecision::Challenge(nonce) => vec![Effect::Send {
                peer,
                notification: Notification::Challenge(nonce.as_bytes().to_vec()),
            }],
            LinkDecision::Reject => vec![Effect::Disconnect { peer }],
        }
    }

    fn on_link_failed(&mut self, peer: PeerIdentity, now: Instant) -> Vec<Effect> {
        // The link layer has already dropped the failed socket.  Any live
        // connection under this identity is only closed once the peer is
        // locked out.
        match self.access.on_link_failed(&peer, now) {
            Some(FailureOutcome::LockedOut { .. }) => {
                info!(%peer, "link failures reached lockout threshold");
                vec![Effect::Disconnect { peer }]
            }
            _ => Vec::new(),
        }
    }

    fn on_response(&mut self, peer: PeerIdentity, digest: &str, now: Instant) -> Vec<Effect> {
        match self.access.on_response(&peer, digest, now) {
            ResponseOutcome::Authenticated { .. } => {
                if self.auto_lock_at.take().is_some() {
                    info!(%peer, "re-authenticated within grace window; automatic re-lock cancelled");
                }
                vec![Effect::Send {
                    peer,
                    notification: Notification::AuthOk,
                }]
            }
            ResponseOutcome::Failed { locked_out } => {
                let mut effects = vec![Effect::Send {
                    peer: peer.clone(),
                    notification: Notification::AuthFail,
                }];
                if locked_out {
                    effects.push(Effect::Disconnect { peer });
                }
                effects
            }
            ResponseOutcome::NotProvisioned => vec![Effect::Send {
                peer,
                notification: Notification::AuthFail,
            }],
            ResponseOutcome::LockedOut => vec![Effect::Disconnect { peer }],
        }
    }

    fn on_command(&mut self, peer: PeerIdentity, payload: &str, now: Instant) -> Vec<Effect> {
        if !self.access.is_authenticated(&peer) {
            return match self.access.reissue_challenge(&peer, now) {
                Reissue::Challenge(nonce) => vec![Effect::Send {
                    peer,
                    notification: Notification::Challenge(nonce.as_bytes().to_vec()),
                }],
                Reissue::LockedOut => vec![Effect::Disconnect { peer }],
                Reissue::UnknownPeer => {
                    debug!(%peer, "payload from unknown connection ignored");
                    Vec::new()
                }
            };
        }

        let dispatch = self.gate.dispatch(payload);
        let reply = dispatch.reply();
        let mut effects = Vec::with_capacity(2);
        if let Dispatch::Execute { action, .. } = dispatch {
            effects.push(Effect::Actuate(action));
        }
        effects.push(Effect::Send {
            peer,
            notification: reply,
        });
        effects
    }

    fn on_disconnected(&mut self, peer: PeerIdentity, now: Instant) -> Vec<Effect> {
        let previous = self.access.on_disconnect(&peer);
        info!(%peer, state = ?previous, "peer disconnected");

        if previous == Some(AuthState::Authenticated)
            && self.access.authenticated_count() == 0
            && self.gate.lock_state().needs_locking()
        {
            let deadline = now + self.grace;
            info!(grace_ms = self.grace.as_millis() as u64, "automatic re-lock scheduled");
            self.auto_lock_at = Some(deadline);
        }
        Vec::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
