//! Per-connection authentication: challenges, verification and admission.
//!
//! # The authentication ladder (for beginners)
//!
//! A connection climbs three rungs and can only move up one at a time:
//!
//! ```text
//!   link paired ──▶ LinkOnly ──(challenge sent)──▶ ChallengeIssued
//!                      ▲                                  │
//!                      └────── wrong digest ◀─────────────┤
//!                                                         │ correct digest
//!                                                         ▼
//!                                                   Authenticated
//! ```
//!
//! `Authenticated` is only ever reached through a correct answer to a
//! challenge this component issued.  Before every step the lockout tracker
//! is consulted, so a banned peer can never climb past `LinkOnly`.
//!
//! [`AccessControl`] owns every per-peer table (sessions, outstanding
//! challenges, failure counters, lockouts, whitelist).  Nothing else in the
//! crate keeps authentication state.

use std::collections::HashMap;
use std::time::Instant;

use keyless_core::{Nonce, PeerIdentity, SharedSecret};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::application::lockout::{FailureOutcome, LockoutPolicy, LockoutTracker};
use crate::application::whitelist::Whitelist;

/// Authentication progress of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    LinkOnly,
    ChallengeIssued,
    Authenticated,
}

/// Whether a peer that answers correctly but is not yet whitelisted may
/// issue commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionPolicy {
    /// First correct answer admits the peer to the whitelist.
    #[default]
    Immediate,
    /// Only peers already on the whitelist (added via the administration
    /// CLI) are accepted.
    ProvisionedOnly,
}

/// Outcome of a link-level event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkDecision {
    /// Send this challenge to the peer.
    Challenge(Nonce),
    /// The peer is banned: drop the connection without touching any state.
    Reject,
}

/// Outcome of a `RESP:` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Correct digest.  `newly_admitted` is `true` on the peer's first success.
    Authenticated { newly_admitted: bool },
    /// Counted as a failure.  `locked_out` means the connection must be dropped.
    Failed { locked_out: bool },
    /// Correct digest, but the admission policy refuses unknown peers.
    NotProvisioned,
    /// The peer is banned and was ignored.
    LockedOut,
}

/// Outcome of a command from a peer that has not finished authenticating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reissue {
    /// Re-send this challenge (the pending one, or a fresh one).
    Challenge(Nonce),
    /// The peer is banned: drop the connection.
    LockedOut,
    /// No live connection is known for this peer.
    UnknownPeer,
}

#[derive(Debug)]
struct Session {
    state: AuthState,
    challenge: Option<Nonce>,
}

/// Owner of all authentication state on the controller.
#[derive(Debug)]
pub struct AccessControl {
    secret: SharedSecret,
    admission: AdmissionPolicy,
    sessions: HashMap<PeerIdentity, Session>,
    lockout: LockoutTracker,
    whitelist: Whitelist,
}

impl AccessControl {
    pub fn new(
        secret: SharedSecret,
        admission: AdmissionPolicy,
        lockout: LockoutPolicy,
        whitelist: Whitelist,
    ) -> Self {
        Self {
            secret,
            admission,
            sessions: HashMap::new(),
            lockout: LockoutTracker::new(lockout),
            whitelist,
        }
    }

    /// The link layer reports a successfully paired connection.
    ///
    /// Always issues a fresh challenge, whitelisted or not, unless the peer
    /// is locked out.
    pub fn on_link_authenticated(&mut self, peer: &PeerIdentity, now: Instant) -> LinkDecision {
        if self.lockout.is_locked_out(peer, now) {
            warn!(%peer, "ignoring link from locked-out peer");
            return LinkDecision::Reject;
        }
        let nonce = Nonce::random();
        self.sessions.insert(
            peer.clone(),
            Session {
                state: AuthState::ChallengeIssued,
                challenge: Some(nonce.clone()),
            },
        );
        info!(%peer, known = self.whitelist.contains(peer), "challenge issued");
        LinkDecision::Challenge(nonce)
    }

    /// The link layer reports a failed pairing (wrong passkey).
    ///
    /// Returns `None` when the peer was already locked out and the event
    /// was ignored.
    pub fn on_link_failed(&mut self, peer: &PeerIdentity, now: Instant) -> Option<FailureOutcome> {
        if self.lockout.is_locked_out(peer, now) {
            debug!(%peer, "ignoring link failure from locked-out peer");
            return None;
        }
        warn!(%peer, "link-level pairing failed");
        Some(self.lockout.record_failure(peer, now))
    }

    /// Verifies a `RESP:` digest against the outstanding challenge.
    ///
    /// The challenge is consumed whatever the result.  A response with no
    /// outstanding challenge counts as a failure.
    pub fn on_response(&mut self, peer: &PeerIdentity, digest_hex: &str, now: Instant) -> ResponseOutcome {
        if self.lockout.is_locked_out(peer, now) {
            warn!(%peer, "ignoring response from locked-out peer");
            return ResponseOutcome::LockedOut;
        }

        let Some(nonce) = self.sessions.get_mut(peer).and_then(|s| s.challenge.take()) else {
            // Also covers a repeated answer after success: the peer is demoted
            // so both ends agree it must answer a fresh challenge.
            warn!(%peer, "response without an outstanding challenge");
            self.set_state(peer, AuthState::LinkOnly);
            return self.fail(peer, now);
        };

        if let Err(e) = self.secret.verify(nonce.as_bytes(), digest_hex) {
            warn!(%peer, reason = %e, "challenge verification failed");
            self.set_state(peer, AuthState::LinkOnly);
            return self.fail(peer, now);
        }

        let known = self.whitelist.contains(peer);
        if !known && self.admission == AdmissionPolicy::ProvisionedOnly {
            warn!(%peer, "correct response from peer that is not provisioned");
            self.set_state(peer, AuthState::LinkOnly);
            return ResponseOutcome::NotProvisioned;
        }

        self.lockout.record_success(peer);
        self.set_state(peer, AuthState::Authenticated);
        let newly_admitted = if known {
            false
        } else {
            match self.whitelist.admit(peer) {
                Ok(added) => added,
                Err(e) => {
                    // A failed write keeps the member in memory; an invalid
                    // identity is never added.
                    error!(%peer, "failed to admit to whitelist: {e}");
                    self.whitelist.contains(peer)
                }
            }
        };
        info!(%peer, newly_admitted, "peer authenticated");
        ResponseOutcome::Authenticated { newly_admitted }
    }

    /// Handles a command from a peer that is not yet authenticated by
    /// re-sending the pending challenge, or issuing a fresh one if none is
    /// outstanding.
    pub fn reissue_challenge(&mut self, peer: &PeerIdentity, now: Instant) -> Reissue {
        if self.lockout.is_locked_out(peer, now) {
            return Reissue::LockedOut;
        }
        let Some(session) = self.sessions.get_mut(peer) else {
            return Reissue::UnknownPeer;
        };
        let nonce = match &session.challenge {
            Some(pending) => pending.clone(),
            None => {
                let fresh = Nonce::random();
                session.challenge = Some(fresh.clone());
                fresh
            }
        };
        session.state = AuthState::ChallengeIssued;
        debug!(%peer, "challenge re-sent to unauthenticated peer");
        Reissue::Challenge(nonce)
    }

    /// Forgets the connection's state.  Counters, lockouts and the whitelist
    /// survive.  Returns the state the connection was in.
    pub fn on_disconnect(&mut self, peer: &PeerIdentity) -> Option<AuthState> {
        self.sessions.remove(peer).map(|s| s.state)
    }

    pub fn state(&self, peer: &PeerIdentity) -> Option<AuthState> {
        self.sessions.get(peer).map(|s| s.state)
    }

    pub fn is_authenticated(&self, peer: &PeerIdentity) -> bool {
        self.state(peer) == Some(AuthState::Authenticated)
    }

    /// Number of live connections that are authenticated.
    pub fn authenticated_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.state == AuthState::Authenticated)
            .count()
    }

    pub fn is_locked_out(&mut self, peer: &PeerIdentity, now: Instant) -> bool {
        self.lockout.is_locked_out(peer, now)
    }

    pub fn failures(&self, peer: &PeerIdentity) -> u32 {
        self.lockout.failures(peer)
    }

    /// Periodic cleanup of expired lockouts.
    pub fn sweep(&mut self, now: Instant) -> usize {
        self.lockout.sweep(now)
    }

    pub fn whitelist(&self) -> &Whitelist {
        &self.whitelist
    }

    fn fail(&mut self, peer: &PeerIdentity, now: Instant) -> ResponseOutcome {
        let locked_out = matches!(
            self.lockout.record_failure(peer, now),
            FailureOutcome::LockedOut { .. }
        );
        ResponseOutcome::Failed { locked_out }
    }

    fn set_state(&mut self, peer: &PeerIdentity, state: AuthState) {
        if let Some(session) = self.sessions.get_mut(peer) {
            session.state = state;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
