//! TOML-based configuration for the key.
//!
//! Lives in `key.toml` next to the controller's file in the platform config
//! directory (see [`keyless_core::config_file`]).
//!
//! ```toml
//! [key]
//! peer_id = "aa:bb:cc:dd:ee:01"
//! controller_address = "192.168.4.1:24900"
//! passkey = "123456"
//!
//! [security]
//! shared_secret = "change-me"
//!
//! [proximity]
//! unlock_threshold = -60
//! lock_threshold = -75
//! window_size = 5
//! confirmation_delay_ms = 2000
//!
//! [signal]
//! script = [-90, -80, -70, -55, -50, -50, -50, -80, -90, -90]
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use keyless_core::config_file::{self, ConfigFileError};
use keyless_core::{PeerIdentity, ProximityError, ProximityFilter, Thresholds};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::key_session::AckTexts;
use crate::infrastructure::network::KeyConnectionConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    File(#[from] ConfigFileError),

    #[error("invalid proximity settings: {0}")]
    Proximity(#[from] ProximityError),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct KeyConfig {
    #[serde(default)]
    pub key: KeySettings,
    #[serde(default)]
    pub security: SecuritySettings,
    #[serde(default)]
    pub proximity: ProximitySettings,
    #[serde(default)]
    pub signal: SignalSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeySettings {
    #[serde(default = "default_peer_id")]
    pub peer_id: String,
    #[serde(default = "default_controller_address")]
    pub controller_address: String,
    #[serde(default = "default_passkey")]
    pub passkey: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Period between signal samples.
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Ack text the controller sends after locking.
    #[serde(default = "default_locked_ack")]
    pub locked_ack: String,
    /// Ack text the controller sends after unlocking.
    #[serde(default = "default_unlocked_ack")]
    pub unlocked_ack: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SecuritySettings {
    #[serde(default)]
    pub shared_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProximitySettings {
    #[serde(default = "default_unlock_threshold")]
    pub unlock_threshold: i16,
    #[serde(default = "default_lock_threshold")]
    pub lock_threshold: i16,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_confirmation_delay_ms")]
    pub confirmation_delay_ms: u64,
}

/// Development signal source.  An empty script means readings only come
/// from the console.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SignalSettings {
    #[serde(default)]
    pub script: Vec<i16>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_peer_id() -> String {
    "keyless-key".to_string()
}
fn default_controller_address() -> String {
    "127.0.0.1:24900".to_string()
}
fn default_passkey() -> String {
    "123456".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_sample_interval_ms() -> u64 {
    1500
}
fn default_initial_backoff_ms() -> u64 {
    1000
}
fn default_max_backoff_ms() -> u64 {
    60_000
}
fn default_locked_ack() -> String {
    "Door Locked".to_string()
}
fn default_unlocked_ack() -> String {
    "Door Unlocked".to_string()
}
fn default_unlock_threshold() -> i16 {
    -60
}
fn default_lock_threshold() -> i16 {
    -75
}
fn default_window_size() -> usize {
    keyless_core::domain::proximity::DEFAULT_WINDOW_SIZE
}
fn default_confirmation_delay_ms() -> u64 {
    2000
}

impl Default for KeySettings {
    fn default() -> Self {
        Self {
            peer_id: default_peer_id(),
            controller_address: default_controller_address(),
            passkey: default_passkey(),
            log_level: default_log_level(),
            sample_interval_ms: default_sample_interval_ms(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            locked_ack: default_locked_ack(),
            unlocked_ack: default_unlocked_ack(),
        }
    }
}

impl Default for ProximitySettings {
    fn default() -> Self {
        Self {
            unlock_threshold: default_unlock_threshold(),
            lock_threshold: default_lock_threshold(),
            window_size: default_window_size(),
            confirmation_delay_ms: default_confirmation_delay_ms(),
        }
    }
}

// ── Conversions into runtime types ────────────────────────────────────────────

impl KeyConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the address does not parse or the
    /// peer id is empty.
    pub fn connection(&self) -> Result<KeyConnectionConfig, ConfigError> {
        let controller_addr: SocketAddr =
            self.key
                .controller_address
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    field: "key.controller_address",
                    reason: e.to_string(),
                })?;
        let peer_id = PeerIdentity::new(self.key.peer_id.as_str());
        if peer_id.is_empty() {
            return Err(ConfigError::Invalid {
                field: "key.peer_id",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(KeyConnectionConfig {
            controller_addr,
            peer_id,
            passkey: self.key.passkey.clone(),
            initial_backoff: Duration::from_millis(self.key.initial_backoff_ms.max(1)),
            max_backoff: Duration::from_millis(self.key.max_backoff_ms.max(1)),
        })
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Proximity`] for a zero window or inverted thresholds.
    pub fn proximity_filter(&self) -> Result<ProximityFilter, ConfigError> {
        let p = &self.proximity;
        let thresholds = Thresholds::new(p.unlock_threshold, p.lock_threshold)?;
        Ok(ProximityFilter::new(p.window_size, thresholds)?)
    }

    pub fn confirmation_delay(&self) -> Duration {
        Duration::from_millis(self.proximity.confirmation_delay_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.key.sample_interval_ms.max(10))
    }

    pub fn ack_texts(&self) -> AckTexts {
        AckTexts {
            locked: self.key.locked_ack.clone(),
            unlocked: self.key.unlocked_ack.clone(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the default path to the key config file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_file::default_path("key.toml")?)
}

/// Loads `KeyConfig` from `path`, returning defaults if the file does not exist.
pub fn load_config(path: &Path) -> Result<KeyConfig, ConfigError> {
    Ok(config_file::load_or_default(path)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
