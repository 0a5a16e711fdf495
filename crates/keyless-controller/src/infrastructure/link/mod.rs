//! Link infrastructure: the transport between keys and the controller.
//!
//! On the vehicle this is an encrypted short-range radio link whose pairing
//! step compares a passkey.  For development and tests a line-oriented TCP
//! link stands in for it:
//!
//! ```text
//! key → controller   PAIR:<peer-id>:<passkey>      (first line, once)
//! key → controller   LOCK | RESP:<hex> | …          (command channel)
//! controller → key   CHALLENGE:<hex> | AUTH_OK | …  (response channel)
//! ```
//!
//! The adapter turns connection activity into controller [`Event`]s and
//! carries outbound notifications back to the right connection through the
//! [`PeerRegistry`].
//!
//! [`Event`]: crate::application::controller::Event

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use keyless_core::{Notification, PeerIdentity};
use thiserror::Error;
use tokio::sync::{mpsc, mpsc::error::TrySendError, Mutex};
use tracing::{debug, warn};

pub mod tcp;

/// Prefix of the pairing line sent by a key when it connects.
pub const PAIR_PREFIX: &str = "PAIR:";

/// Error type for link operations.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed pairing line: {0:?}")]
    MalformedPairing(String),
    #[error("pairing timed out")]
    PairingTimeout,
    #[error("peer {0} already has a live connection")]
    DuplicatePeer(PeerIdentity),
    #[error("write to peer timed out")]
    WriteTimeout,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parsed `PAIR:<peer-id>:<passkey>` line.
///
/// The passkey is taken from after the *last* colon so that peer identities
/// shaped like link-layer addresses (`aa:bb:cc:dd:ee:ff`) survive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairRequest {
    pub peer: PeerIdentity,
    pub passkey: String,
}

impl PairRequest {
    /// # Errors
    ///
    /// Returns [`LinkError::MalformedPairing`] if the prefix is missing or
    /// the peer identity is empty.
    pub fn parse(line: &str) -> Result<Self, LinkError> {
        let line = line.trim();
        let malformed = || LinkError::MalformedPairing(line.to_string());
        let rest = line.strip_prefix(PAIR_PREFIX).ok_or_else(malformed)?;
        let (peer, passkey) = rest.rsplit_once(':').ok_or_else(malformed)?;
        let peer = PeerIdentity::new(peer);
        if peer.is_empty() {
            return Err(malformed());
        }
        Ok(Self {
            peer,
            passkey: passkey.trim().to_string(),
        })
    }
}

/// What the controller wants done with one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Send(Notification),
    Close,
}

/// Identifies one registration, so a connection that has already been
/// replaced cannot unregister its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

#[derive(Debug)]
struct Connection {
    id: ConnectionId,
    tx: mpsc::Sender<Outbound>,
}

/// Live connections keyed by peer, used to route outbound notifications.
///
/// Delivery never waits: a peer that stops reading fills its queue and is
/// dropped from the registry, which closes its connection once the queued
/// lines are written.  One slow peer therefore cannot stall the controller.
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    peers: Arc<Mutex<HashMap<PeerIdentity, Connection>>>,
    next_id: Arc<AtomicU64>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection.  Fails if the peer already has one.
    pub async fn register(
        &self,
        peer: &PeerIdentity,
        tx: mpsc::Sender<Outbound>,
    ) -> Result<ConnectionId, LinkError> {
        let mut peers = self.peers.lock().await;
        if peers.contains_key(peer) {
            return Err(LinkError::DuplicatePeer(peer.clone()));
        }
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        peers.insert(peer.clone(), Connection { id, tx });
        Ok(id)
    }

    /// Removes the registration `id` of `peer`, if it is still the current one.
    pub async fn unregister(&self, peer: &PeerIdentity, id: ConnectionId) {
        let mut peers = self.peers.lock().await;
        if peers.get(peer).is_some_and(|conn| conn.id == id) {
            peers.remove(peer);
        }
    }

    /// Queues `outbound` for `peer` without waiting.
    ///
    /// Returns `false` if the peer is gone or its queue was full; in the
    /// latter case the peer is dropped.
    pub async fn deliver(&self, peer: &PeerIdentity, outbound: Outbound) -> bool {
        let mut peers = self.peers.lock().await;
        let Some(conn) = peers.get(peer) else {
            debug!(%peer, "dropping outbound message for unknown peer");
            return false;
        };
        match conn.tx.try_send(outbound) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(%peer, "outbound queue full; dropping connection");
                peers.remove(peer);
                false
            }
            Err(TrySendError::Closed(_)) => {
                peers.remove(peer);
                false
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.peers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.lock().await.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
