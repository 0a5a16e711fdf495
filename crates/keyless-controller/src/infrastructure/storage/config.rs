//! TOML-based configuration for the lock controller.
//!
//! Reads `AppConfig` from the platform-appropriate config file, or from a
//! path given on the command line:
//! - Windows:  `%APPDATA%\Keyless\controller.toml`
//! - Linux:    `~/.config/keyless/controller.toml`
//! - macOS:    `~/Library/Application Support/Keyless/controller.toml`
//!
//! Example:
//!
//! ```toml
//! [controller]
//! log_level = "debug"
//! auto_lock_grace_ms = 3000
//!
//! [security]
//! shared_secret = "change-me"
//! lockout_threshold = 5
//! lockout_duration_secs = 300
//! admission = "immediate"
//!
//! [link]
//! port = 24900
//! passkey = "123456"
//!
//! [commands.trunk]
//! output = "tailgate"
//! pattern = "pulse"
//! duration_ms = 800
//! ack = "Trunk Opened"
//! ```
//!
//! Every field has a `#[serde(default = "...")]` helper, so a partial file
//! (or no file at all) works.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use keyless_core::config_file::{self, ConfigFileError};
use keyless_core::Command;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::access_control::AdmissionPolicy;
use crate::application::command_gate::{CommandBinding, CommandTable, Pattern};
use crate::application::lockout::LockoutPolicy;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be located, read, parsed or written.
    #[error(transparent)]
    File(#[from] ConfigFileError),

    /// A value parsed but makes no sense.
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level controller configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub link: LinkSettings,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
}

/// General controller behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControllerConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Delay between the last authenticated key leaving and the automatic re-lock.
    #[serde(default = "default_auto_lock_grace_ms")]
    pub auto_lock_grace_ms: u64,
    /// Period of the housekeeping tick (lockout sweep, re-lock deadline).
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

/// Authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityConfig {
    /// Pre-shared HMAC key.  Must be set; an empty secret refuses to start.
    #[serde(default)]
    pub shared_secret: String,
    #[serde(default = "default_lockout_threshold")]
    pub lockout_threshold: u32,
    #[serde(default = "default_lockout_duration_secs")]
    pub lockout_duration_secs: u64,
    #[serde(default)]
    pub admission: AdmissionPolicy,
}

/// Development TCP link settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkSettings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_link_port")]
    pub port: u16,
    /// Passkey every key must present when pairing.
    #[serde(default = "default_passkey")]
    pub passkey: String,
    #[serde(default = "default_pairing_timeout_secs")]
    pub pairing_timeout_secs: u64,
}

/// Whitelist persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StorageConfig {
    /// Store file.  When absent, `whitelist.toml` next to the config file is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
}

/// One command's actuation and acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandConfig {
    pub output: String,
    pub pattern: Pattern,
    pub duration_ms: u64,
    pub ack: String,
}

/// Per-command bindings.  Missing tables keep the built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandsConfig {
    #[serde(default = "default_lock")]
    pub lock: CommandConfig,
    #[serde(default = "default_unlock")]
    pub unlock: CommandConfig,
    #[serde(default = "default_trunk")]
    pub trunk: CommandConfig,
    #[serde(default = "default_locate")]
    pub locate: CommandConfig,
    #[serde(default = "default_elight")]
    pub elight: CommandConfig,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_auto_lock_grace_ms() -> u64 {
    3000
}
fn default_tick_ms() -> u64 {
    250
}
fn default_lockout_threshold() -> u32 {
    5
}
fn default_lockout_duration_secs() -> u64 {
    300
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_link_port() -> u16 {
    24900
}
fn default_passkey() -> String {
    "123456".to_string()
}
fn default_pairing_timeout_secs() -> u64 {
    10
}

fn default_binding(command: Command) -> CommandConfig {
    CommandConfig::from(CommandTable::default().get(command))
}
fn default_lock() -> CommandConfig {
    default_binding(Command::Lock)
}
fn default_unlock() -> CommandConfig {
    default_binding(Command::Unlock)
}
fn default_trunk() -> CommandConfig {
    default_binding(Command::Trunk)
}
fn default_locate() -> CommandConfig {
    default_binding(Command::Locate)
}
fn default_elight() -> CommandConfig {
    default_binding(Command::Elight)
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            auto_lock_grace_ms: default_auto_lock_grace_ms(),
            tick_ms: default_tick_ms(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            shared_secret: String::new(),
            lockout_threshold: default_lockout_threshold(),
            lockout_duration_secs: default_lockout_duration_secs(),
            admission: AdmissionPolicy::default(),
        }
    }
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_link_port(),
            passkey: default_passkey(),
            pairing_timeout_secs: default_pairing_timeout_secs(),
        }
    }
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            lock: default_lock(),
            unlock: default_unlock(),
            trunk: default_trunk(),
            locate: default_locate(),
            elight: default_elight(),
        }
    }
}

impl From<&CommandBinding> for CommandConfig {
    fn from(binding: &CommandBinding) -> Self {
        Self {
            output: binding.action.output.clone(),
            pattern: binding.action.pattern,
            duration_ms: binding.action.duration.as_millis() as u64,
            ack: binding.ack.clone(),
        }
    }
}

impl From<&CommandConfig> for CommandBinding {
    fn from(cfg: &CommandConfig) -> Self {
        CommandBinding::new(
            &cfg.output,
            cfg.pattern,
            Duration::from_millis(cfg.duration_ms),
            &cfg.ack,
        )
    }
}

// ── Conversions into runtime types ────────────────────────────────────────────

impl AppConfig {
    /// Builds the declarative command table.
    pub fn command_table(&self) -> CommandTable {
        let c = &self.commands;
        CommandTable {
            lock: (&c.lock).into(),
            unlock: (&c.unlock).into(),
            trunk: (&c.trunk).into(),
            locate: (&c.locate).into(),
            elight: (&c.elight).into(),
        }
    }

    /// Every output name referenced by the command table.
    pub fn outputs(&self) -> Vec<String> {
        let c = &self.commands;
        [&c.lock, &c.unlock, &c.trunk, &c.locate, &c.elight]
            .iter()
            .map(|cmd| cmd.output.clone())
            .collect()
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero threshold.
    pub fn lockout_policy(&self) -> Result<LockoutPolicy, ConfigError> {
        if self.security.lockout_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "security.lockout_threshold",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(LockoutPolicy {
            threshold: self.security.lockout_threshold,
            duration: Duration::from_secs(self.security.lockout_duration_secs),
        })
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the bind address is not an IP.
    pub fn link_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.link.bind_address, self.link.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                field: "link.bind_address",
                reason: e.to_string(),
            })
    }

    pub fn auto_lock_grace(&self) -> Duration {
        Duration::from_millis(self.controller.auto_lock_grace_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.controller.tick_ms.max(10))
    }

    pub fn pairing_timeout(&self) -> Duration {
        Duration::from_secs(self.link.pairing_timeout_secs)
    }

    /// Resolves the whitelist store file for a config loaded from `config_path`.
    pub fn store_path(&self, config_path: &Path) -> PathBuf {
        match &self.storage.store_path {
            Some(path) => path.clone(),
            None => config_path
                .parent()
                .map(|dir| dir.join("whitelist.toml"))
                .unwrap_or_else(|| PathBuf::from("whitelist.toml")),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the default path to the controller config file.
///
/// # Errors
///
/// Returns [`ConfigError::File`] when the platform config directory cannot
/// be determined from the environment.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_file::default_path("controller.toml")?)
}

/// Loads `AppConfig` from `path`, returning defaults if the file does not
/// exist yet.
///
/// # Errors
///
/// Returns [`ConfigError::File`] for file-system errors other than
/// "not found", or if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    Ok(config_file::load_or_default(path)?)
}

/// Persists `config` to `path`, creating parent directories as needed.
pub fn save_config(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    Ok(config_file::save(config, path)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
