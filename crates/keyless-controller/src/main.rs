//! Keyless lock controller entry point.
//!
//! # Usage
//!
//! ```text
//! keyless-controller [--config <PATH>] [COMMAND]
//!
//! Commands:
//!   run                     Serve keys until Ctrl-C (default)
//!   init                    Write a default config file if none exists
//!   whitelist list          Print the provisioned keys
//!   whitelist add <PEER>    Provision a key ahead of time
//!   whitelist remove <PEER> Revoke a key
//! ```
//!
//! The config path can also be given through `KEYLESS_CONTROLLER_CONFIG`.
//! The log level comes from `RUST_LOG`, falling back to
//! `controller.log_level` in the config file.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()
//!  └─ Whitelist::load(FileStore)     -- persisted peers
//!  └─ Controller::new()              -- authentication + command gate
//!  └─ LinkServer::run()              -- TCP stand-in for the radio link
//!  └─ ControllerRuntime::run()       -- events in, effects out
//! ```

use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use keyless_core::{PeerIdentity, SharedSecret};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use keyless_controller::application::access_control::AccessControl;
use keyless_controller::application::command_gate::CommandGate;
use keyless_controller::application::controller::Controller;
use keyless_controller::application::whitelist::{KeyValueStore, Whitelist};
use keyless_controller::infrastructure::actuation::service::ActuationService;
use keyless_controller::infrastructure::actuation::simulated::SimulatedActuator;
use keyless_controller::infrastructure::link::tcp::{LinkConfig, LinkServer};
use keyless_controller::infrastructure::link::PeerRegistry;
use keyless_controller::infrastructure::runtime::ControllerRuntime;
use keyless_controller::infrastructure::storage::config::{
    config_file_path, load_config, save_config, AppConfig,
};
use keyless_controller::infrastructure::storage::kv_store::{FileStore, MemoryStore};

/// Depth of the link → controller event queue.
const EVENT_QUEUE: usize = 64;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Keyless vehicle access controller.
#[derive(Debug, Parser)]
#[command(
    name = "keyless-controller",
    about = "Challenge-response lock controller for keyless vehicle access",
    version
)]
struct Cli {
    /// Path to the TOML config file.  Defaults to the platform config dir.
    #[arg(long, env = "KEYLESS_CONTROLLER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
enum CliCommand {
    /// Serve keys until interrupted.
    Run {
        /// Keep the whitelist in memory only; nothing is written to disk.
        #[arg(long)]
        ephemeral: bool,
    },
    /// Write a default config file if none exists.
    Init,
    /// Inspect or edit the persisted whitelist.
    Whitelist {
        #[command(subcommand)]
        action: WhitelistAction,
    },
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
enum WhitelistAction {
    List,
    Add { peer: String },
    Remove { peer: String },
}

impl Cli {
    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => config_file_path().context("no --config given and no platform config dir"),
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config_path()?;
    let config = load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.controller.log_level)),
        )
        .init();

    match cli.command.unwrap_or(CliCommand::Run { ephemeral: false }) {
        CliCommand::Run { ephemeral } => run(config, &config_path, ephemeral).await,
        CliCommand::Init => init(&config_path),
        CliCommand::Whitelist { action } => manage_whitelist(&config, &config_path, action),
    }
}

async fn run(config: AppConfig, config_path: &Path, ephemeral: bool) -> anyhow::Result<()> {
    info!("keyless controller starting");

    let secret = SharedSecret::new(config.security.shared_secret.as_bytes())
        .context("security.shared_secret must be set")?;
    let store: Box<dyn KeyValueStore> = if ephemeral {
        warn!("ephemeral mode: whitelist changes will not be persisted");
        Box::new(MemoryStore::new())
    } else {
        Box::new(FileStore::open(config.store_path(config_path))?)
    };
    let whitelist = Whitelist::load(store)?;
    info!("{} peer(s) whitelisted", whitelist.len());

    let access = AccessControl::new(
        secret,
        config.security.admission,
        config.lockout_policy()?,
        whitelist,
    );
    let controller = Controller::new(
        access,
        CommandGate::new(config.command_table()),
        config.auto_lock_grace(),
    );

    let running = Arc::new(AtomicBool::new(true));
    let registry = PeerRegistry::new();
    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);

    let link = LinkServer::bind(
        LinkConfig {
            bind_addr: config.link_addr()?,
            passkey: config.link.passkey.clone(),
            pairing_timeout: config.pairing_timeout(),
        },
        registry.clone(),
        events_tx,
    )
    .await?;
    let link_task = tokio::spawn(link.run(Arc::clone(&running)));

    let actuation = ActuationService::new(Arc::new(SimulatedActuator::new(config.outputs())));
    let runtime = ControllerRuntime::new(controller, registry, actuation, config.tick_interval());

    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => error!("failed to listen for Ctrl-C: {e}"),
        }
    });

    info!("keyless controller ready.  Press Ctrl-C to exit.");
    let controller = runtime.run(events_rx, Arc::clone(&running)).await;
    running.store(false, Ordering::Relaxed);
    if let Err(e) = link_task.await {
        warn!("link task ended abnormally: {e}");
    }

    info!(lock_state = ?controller.lock_state(), "keyless controller stopped");
    Ok(())
}

fn init(config_path: &Path) -> anyhow::Result<()> {
    if config_path.exists() {
        println!("{} already exists", config_path.display());
        return Ok(());
    }
    save_config(&AppConfig::default(), config_path)?;
    println!(
        "wrote {}; set security.shared_secret before running",
        config_path.display()
    );
    Ok(())
}

fn manage_whitelist(
    config: &AppConfig,
    config_path: &Path,
    action: WhitelistAction,
) -> anyhow::Result<()> {
    let store = FileStore::open(config.store_path(config_path))?;
    let mut whitelist = Whitelist::load(Box::new(store))?;

    match action {
        WhitelistAction::List => {
            for peer in whitelist.iter() {
                println!("{peer}");
            }
        }
        WhitelistAction::Add { peer } => {
            let peer = PeerIdentity::new(peer);
            if whitelist.admit(&peer)? {
                println!("added {peer}");
            } else {
                println!("{peer} is already whitelisted");
            }
        }
        WhitelistAction::Remove { peer } => {
            let peer = PeerIdentity::new(peer);
            if whitelist.remove(&peer)? {
                println!("removed {peer}");
            } else {
                println!("{peer} was not whitelisted");
            }
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_without_subcommand_defaults_to_run() {
        let cli = Cli::parse_from(["keyless-controller"]);
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_cli_config_override() {
        let cli = Cli::parse_from(["keyless-controller", "--config", "/tmp/c.toml"]);
        assert_eq!(cli.config_path().unwrap(), PathBuf::from("/tmp/c.toml"));
    }

    #[test]
    fn test_cli_run_ephemeral() {
        let cli = Cli::parse_from(["keyless-controller", "run", "--ephemeral"]);
        assert_eq!(cli.command, Some(CliCommand::Run { ephemeral: true }));
    }

    #[test]
    fn test_cli_whitelist_add_keeps_colons() {
        // Arrange / Act
        let cli = Cli::parse_from(["keyless-controller", "whitelist", "add", "aa:bb:cc:dd:ee:ff"]);

        // Assert
        assert_eq!(
            cli.command,
            Some(CliCommand::Whitelist {
                action: WhitelistAction::Add {
                    peer: "aa:bb:cc:dd:ee:ff".to_string()
                }
            })
        );
    }

    #[test]
    fn test_cli_whitelist_remove_requires_peer() {
        assert!(Cli::try_parse_from(["keyless-controller", "whitelist", "remove"]).is_err());
    }

    #[test]
    fn test_manage_whitelist_add_then_remove_persists() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("keyless_cli_test_{}", uuid::Uuid::new_v4()));
        let config_path = dir.join("controller.toml");
        let config = AppConfig::default();
        let peer = "key-7".to_string();

        // Act
        manage_whitelist(&config, &config_path, WhitelistAction::Add { peer: peer.clone() })
            .unwrap();
        let store = FileStore::open(config.store_path(&config_path)).unwrap();
        let after_add = Whitelist::load(Box::new(store)).unwrap();
        manage_whitelist(&config, &config_path, WhitelistAction::Remove { peer }).unwrap();
        let store = FileStore::open(config.store_path(&config_path)).unwrap();
        let after_remove = Whitelist::load(Box::new(store)).unwrap();

        // Assert
        assert!(after_add.contains(&PeerIdentity::new("key-7")));
        assert!(after_remove.is_empty());

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_init_writes_default_config_once() {
        let dir = std::env::temp_dir().join(format!("keyless_init_test_{}", uuid::Uuid::new_v4()));
        let path = dir.join("controller.toml");

        init(&path).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        init(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), first);
        assert_eq!(load_config(&path).unwrap(), AppConfig::default());
        std::fs::remove_dir_all(&dir).ok();
    }
}
