//! Failed-attempt counting and temporary lockout per peer.
//!
//! Every authentication failure (wrong link passkey, a response without an
//! outstanding challenge, a wrong digest) is recorded here.  When a peer
//! reaches the threshold it is banned until `now + duration`.  The ban clears
//! itself: the first check after expiry drops the record and resets the
//! counter, so the peer starts over with a clean slate.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use keyless_core::PeerIdentity;
use tracing::{debug, info, warn};

pub const DEFAULT_LOCKOUT_THRESHOLD: u32 = 5;
pub const DEFAULT_LOCKOUT_DURATION: Duration = Duration::from_secs(5 * 60);

/// Threshold and duration for temporary bans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub threshold: u32,
    pub duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_LOCKOUT_THRESHOLD,
            duration: DEFAULT_LOCKOUT_DURATION,
        }
    }
}

/// Result of recording one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The failure was counted; the peer may try again.
    Counted { attempts: u32, remaining: u32 },
    /// The threshold was reached and the peer is now banned.
    LockedOut { until: Instant },
}

#[derive(Debug)]
struct LockoutEntry {
    locked_until: Instant,
}

/// Per-peer failure counters and active lockouts.
#[derive(Debug, Default)]
pub struct LockoutTracker {
    policy: LockoutPolicy,
    failures: HashMap<PeerIdentity, u32>,
    lockouts: HashMap<PeerIdentity, LockoutEntry>,
}

impl LockoutTracker {
    pub fn new(policy: LockoutPolicy) -> Self {
        Self {
            policy,
            failures: HashMap::new(),
            lockouts: HashMap::new(),
        }
    }

    pub fn policy(&self) -> LockoutPolicy {
        self.policy
    }

    /// Counts a failure and starts (or restarts) a lockout at the threshold.
    pub fn record_failure(&mut self, peer: &PeerIdentity, now: Instant) -> FailureOutcome {
        let attempts = self.failures.entry(peer.clone()).or_insert(0);
        *attempts = attempts.saturating_add(1);
        let attempts = *attempts;

        if attempts >= self.policy.threshold {
            let until = now + self.policy.duration;
            self.lockouts
                .insert(peer.clone(), LockoutEntry { locked_until: until });
            warn!(
                %peer,
                attempts,
                lockout_secs = self.policy.duration.as_secs(),
                "peer locked out after repeated authentication failures"
            );
            FailureOutcome::LockedOut { until }
        } else {
            let remaining = self.policy.threshold - attempts;
            debug!(%peer, attempts, remaining, "authentication failure recorded");
            FailureOutcome::Counted {
                attempts,
                remaining,
            }
        }
    }

    /// Resets the failure counter after a successful authentication.
    pub fn record_success(&mut self, peer: &PeerIdentity) {
        self.failures.remove(peer);
    }

    /// `true` while the peer is banned.
    ///
    /// An expired lockout is pruned here and its counter reset.
    pub fn is_locked_out(&mut self, peer: &PeerIdentity, now: Instant) -> bool {
        match self.lockouts.get(peer) {
            Some(entry) if now < entry.locked_until => true,
            Some(_) => {
                self.lockouts.remove(peer);
                self.failures.remove(peer);
                info!(%peer, "lockout expired");
                false
            }
            None => false,
        }
    }

    /// Time left on an active lockout.
    pub fn remaining(&self, peer: &PeerIdentity, now: Instant) -> Option<Duration> {
        self.lockouts
            .get(peer)
            .filter(|entry| now < entry.locked_until)
            .map(|entry| entry.locked_until - now)
    }

    /// Current failure count for `peer`.
    pub fn failures(&self, peer: &PeerIdentity) -> u32 {
        self.failures.get(peer).copied().unwrap_or(0)
    }

    /// Drops every expired lockout.  Returns how many were removed.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let expired: Vec<PeerIdentity> = self
            .lockouts
            .iter()
            .filter(|(_, entry)| now >= entry.locked_until)
            .map(|(peer, _)| peer.clone())
            .collect();
        for peer in &expired {
            self.lockouts.remove(peer);
            self.failures.remove(peer);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "swept expired lockouts");
        }
        expired.len()
    }

    pub fn active_lockouts(&self) -> usize {
        self.lockouts.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
