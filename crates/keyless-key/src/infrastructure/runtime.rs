//! Async driver for the [`KeyAgent`].
//!
//! One task owns the agent and multiplexes three inputs:
//!
//! ```text
//! KeyConnection ──NetworkEvent──┐
//! sample ticker ──SignalSource──┼──▶ KeyAgent::handle ──Request──▶ KeyConnection::send
//! console       ──UserInput─────┘
//! ```
//!
//! Sampling only happens while the link is up.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::application::agent::{KeyAgent, KeyEvent};
use crate::infrastructure::console::UserInput;
use crate::infrastructure::network::{KeyConnection, NetworkEvent};
use crate::infrastructure::signal::SignalSource;

pub struct KeyRuntime {
    agent: KeyAgent,
    connection: Arc<KeyConnection>,
    signal: Box<dyn SignalSource>,
    sample_interval: Duration,
}

impl KeyRuntime {
    pub fn new(
        agent: KeyAgent,
        connection: Arc<KeyConnection>,
        signal: Box<dyn SignalSource>,
        sample_interval: Duration,
    ) -> Self {
        Self {
            agent,
            connection,
            signal,
            sample_interval,
        }
    }

    /// Runs until `running` is cleared or the network channel closes.
    /// Returns the agent so callers can inspect the final state.
    pub async fn run(
        mut self,
        mut network: mpsc::Receiver<NetworkEvent>,
        mut user: mpsc::Receiver<UserInput>,
        running: Arc<AtomicBool>,
    ) -> KeyAgent {
        let mut ticker = tokio::time::interval(self.sample_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut user_open = true;

        while running.load(Ordering::Relaxed) {
            let event = tokio::select! {
                event = network.recv() => match event {
                    Some(NetworkEvent::Connected { controller_addr }) => {
                        info!("link up to {controller_addr}");
                        KeyEvent::Connected
                    }
                    Some(NetworkEvent::Received(notification)) => KeyEvent::Notification(notification),
                    Some(NetworkEvent::Disconnected) => {
                        warn!("link lost; reconnect in progress");
                        KeyEvent::Disconnected
                    }
                    None => break,
                },
                input = user.recv(), if user_open => match input {
                    Some(UserInput::Command(command)) => KeyEvent::User(command),
                    Some(UserInput::Rssi(rssi)) => KeyEvent::Sample(rssi),
                    None => {
                        debug!("user input closed");
                        user_open = false;
                        continue;
                    }
                },
                _ = ticker.tick() => {
                    if !self.agent.is_connected() {
                        continue;
                    }
                    match self.signal.sample() {
                        Some(rssi) => KeyEvent::Sample(rssi),
                        None => continue,
                    }
                }
            };

            for request in self.agent.handle(event, Instant::now()) {
                if let Err(e) = self.connection.send(&request).await {
                    warn!(%request, "send failed: {e}");
                }
            }
        }

        info!("key runtime stopping");
        self.agent
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
