//! Persisted set of peers that have proven possession of the shared secret.
//!
//! The whitelist is stored through a minimal string key-value store (the
//! [`KeyValueStore`] port) as a single comma-delimited blob under the key
//! [`WHITELIST_KEY`].  The whole blob is rewritten on every change, which
//! keeps the on-disk format trivial and means a half-applied update can
//! never leave a partial entry behind.
//!
//! ```text
//! whitelist = "aa:bb:cc:dd:ee:01,aa:bb:cc:dd:ee:02"
//! ```
//!
//! Membership only grows through successful authentication (or explicit
//! provisioning) and only shrinks through explicit removal.

use std::collections::BTreeSet;
use std::path::PathBuf;

use keyless_core::PeerIdentity;
use thiserror::Error;
use tracing::{debug, info};

/// Store key under which the comma-delimited whitelist is kept.
pub const WHITELIST_KEY: &str = "whitelist";

const SEPARATOR: char = ',';

/// Error type for whitelist persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing store at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The stored data could not be decoded.
    #[error("store at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// The identity cannot be represented in the comma-delimited format.
    #[error("peer identity {0:?} cannot be stored (empty or contains a comma)")]
    InvalidEntry(String),

    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Minimal persistent string-blob store.
///
/// Production code uses a TOML file; tests use an in-memory map or a
/// `mockall` mock to inject failures.
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStore: Send {
    /// Returns the blob stored under `key`, or `None` if nothing was stored.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replaces the blob stored under `key`.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-memory copy of the whitelist backed by a [`KeyValueStore`].
pub struct Whitelist {
    peers: BTreeSet<PeerIdentity>,
    store: Box<dyn KeyValueStore>,
}

impl Whitelist {
    /// Loads the whitelist from `store`.  A missing key means an empty list.
    ///
    /// # Errors
    ///
    /// Propagates any [`StoreError`] from the backend.
    pub fn load(store: Box<dyn KeyValueStore>) -> Result<Self, StoreError> {
        let peers = match store.get(WHITELIST_KEY)? {
            Some(blob) => decode(&blob),
            None => BTreeSet::new(),
        };
        debug!(count = peers.len(), "whitelist loaded");
        Ok(Self { peers, store })
    }

    pub fn contains(&self, peer: &PeerIdentity) -> bool {
        self.peers.contains(peer)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Iterates over members in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &PeerIdentity> {
        self.peers.iter()
    }

    /// Adds `peer` and persists the full list.
    ///
    /// Returns `Ok(true)` if the peer was new and `Ok(false)` if it was
    /// already present (nothing is written in that case).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidEntry`] for identities that cannot be
    /// stored, or the backend error if the write fails.  On a failed write
    /// the in-memory set keeps the new member and the next successful write
    /// persists it.
    pub fn admit(&mut self, peer: &PeerIdentity) -> Result<bool, StoreError> {
        validate(peer)?;
        if !self.peers.insert(peer.clone()) {
            return Ok(false);
        }
        info!(%peer, "peer admitted to whitelist");
        self.persist()?;
        Ok(true)
    }

    /// Removes `peer` and persists the full list.
    ///
    /// Returns `Ok(false)` if the peer was not a member.
    pub fn remove(&mut self, peer: &PeerIdentity) -> Result<bool, StoreError> {
        if !self.peers.remove(peer) {
            return Ok(false);
        }
        info!(%peer, "peer removed from whitelist");
        self.persist()?;
        Ok(true)
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        let blob = encode(&self.peers);
        self.store.set(WHITELIST_KEY, &blob)
    }
}

impl std::fmt::Debug for Whitelist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Whitelist").field("peers", &self.peers).finish()
    }
}

fn validate(peer: &PeerIdentity) -> Result<(), StoreError> {
    if peer.is_empty() || peer.as_str().contains(SEPARATOR) {
        return Err(StoreError::InvalidEntry(peer.to_string()));
    }
    Ok(())
}

fn decode(blob: &str) -> BTreeSet<PeerIdentity> {
    blob.split(SEPARATOR)
        .map(PeerIdentity::new)
        .filter(|p| !p.is_empty())
        .collect()
}

fn encode(peers: &BTreeSet<PeerIdentity>) -> String {
    peers
        .iter()
        .map(PeerIdentity::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
