//! Keyless key entry point.
//!
//! Connects to the controller, answers its challenges, sends commands typed
//! on stdin, and locks or unlocks automatically from signal strength.
//!
//! # Usage
//!
//! ```text
//! keyless-key [--config <PATH>] [--controller <ADDR>] [--peer-id <ID>]
//!
//! stdin:
//!   lock | unlock | trunk | locate | elight
//!   rssi <dBm>
//! ```
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()
//!  └─ KeyConnection::start()  -- reconnect loop with backoff
//!  └─ forward_input(stdin)    -- console commands
//!  └─ KeyRuntime::run()       -- agent event loop
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use keyless_core::SharedSecret;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use keyless_key::application::agent::KeyAgent;
use keyless_key::application::auto_trigger::AutoTrigger;
use keyless_key::application::key_session::KeySession;
use keyless_key::infrastructure::console::forward_input;
use keyless_key::infrastructure::network::KeyConnection;
use keyless_key::infrastructure::runtime::KeyRuntime;
use keyless_key::infrastructure::signal::ScriptedSignal;
use keyless_key::infrastructure::storage::config::{config_file_path, load_config, KeyConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Keyless vehicle key.
#[derive(Debug, Parser)]
#[command(
    name = "keyless-key",
    about = "Challenge-answering key with proximity auto lock/unlock",
    version
)]
struct Cli {
    /// Path to the TOML config file.  Defaults to the platform config dir.
    #[arg(long, env = "KEYLESS_KEY_CONFIG")]
    config: Option<PathBuf>,

    /// Controller address, overriding `key.controller_address`.
    #[arg(long, env = "KEYLESS_CONTROLLER_ADDR")]
    controller: Option<String>,

    /// Peer identity, overriding `key.peer_id`.
    #[arg(long)]
    peer_id: Option<String>,
}

impl Cli {
    /// Loads the config file and applies command-line overrides.
    fn into_config(self) -> anyhow::Result<KeyConfig> {
        let path = match self.config {
            Some(path) => path,
            None => config_file_path().context("no --config given and no platform config dir")?,
        };
        let mut config =
            load_config(&path).with_context(|| format!("loading {}", path.display()))?;
        if let Some(controller) = self.controller {
            config.key.controller_address = controller;
        }
        if let Some(peer_id) = self.peer_id {
            config.key.peer_id = peer_id;
        }
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.key.log_level)),
        )
        .init();

    info!("keyless key starting as {}", config.key.peer_id);

    let secret = SharedSecret::new(config.security.shared_secret.as_bytes())
        .context("security.shared_secret must be set")?;
    let agent = KeyAgent::new(
        KeySession::new(secret, config.ack_texts()),
        AutoTrigger::new(config.proximity_filter()?, config.confirmation_delay()),
    );

    let running = Arc::new(AtomicBool::new(true));
    let connection = Arc::new(KeyConnection::new(config.connection()?));
    let network_rx = Arc::clone(&connection).start(Arc::clone(&running));

    let (user_tx, user_rx) = mpsc::channel(16);
    tokio::spawn(forward_input(BufReader::new(tokio::io::stdin()), user_tx));

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

    let signal = ScriptedSignal::new(config.signal.script.clone());
    if signal.is_empty() {
        info!("no signal script configured; use `rssi <dBm>` to inject readings");
    }
    let runtime = KeyRuntime::new(agent, connection, Box::new(signal), config.sample_interval());

    info!("keyless key ready.  Type a command or press Ctrl-C to exit.");
    let agent = runtime.run(network_rx, user_rx, running).await;

    info!(lock_state = ?agent.session().lock_state(), "keyless key stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
