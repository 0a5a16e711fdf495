//! Async driver for the [`Controller`] state machine.
//!
//! The controller itself is synchronous and owns all protocol state.  This
//! module feeds it link events and periodic ticks from one Tokio task, then
//! carries out the returned [`Effect`]s:
//!
//! ```text
//! LinkServer ──Event──▶ ControllerRuntime ──Outbound──▶ PeerRegistry ──▶ key
//!                              │
//!                              └──Action──▶ actuation worker ──▶ ActuationService
//! ```
//!
//! Actions are queued to a single worker so they run in the order the
//! controller produced them.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::command_gate::Action;
use crate::application::controller::{Controller, Effect, Event};
use crate::infrastructure::actuation::service::ActuationService;
use crate::infrastructure::link::{Outbound, PeerRegistry};

/// Depth of the queue between the controller and the actuation worker.
const ACTION_QUEUE: usize = 32;

/// Owns the controller while the service is running.
pub struct ControllerRuntime {
    controller: Controller,
    registry: PeerRegistry,
    actions: mpsc::Sender<Action>,
    worker: JoinHandle<()>,
    tick: Duration,
}

impl ControllerRuntime {
    /// Creates the runtime and starts the actuation worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        controller: Controller,
        registry: PeerRegistry,
        actuation: ActuationService,
        tick: Duration,
    ) -> Self {
        let (actions, rx) = mpsc::channel(ACTION_QUEUE);
        let worker = tokio::spawn(actuation_worker(actuation, rx));
        Self {
            controller,
            registry,
            actions,
            worker,
            tick,
        }
    }

    /// Processes events and ticks until `running` is cleared or every event
    /// sender is gone.  Returns the controller so callers can inspect the
    /// final state.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<Event>,
        running: Arc<AtomicBool>,
    ) -> Controller {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while running.load(Ordering::Relaxed) {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        debug!(?event, "controller event");
                        let effects = self.controller.handle(event, Instant::now());
                        self.apply(effects).await;
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    let effects = self.controller.tick(Instant::now());
                    self.apply(effects).await;
                }
            }
        }

        info!("controller runtime stopping");
        drop(self.actions);
        if let Err(e) = self.worker.await {
            warn!("actuation worker ended abnormally: {e}");
        }
        self.controller
    }

    async fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send { peer, notification } => {
                    self.registry
                        .deliver(&peer, Outbound::Send(notification))
                        .await;
                }
                Effect::Disconnect { peer } => {
                    self.registry.deliver(&peer, Outbound::Close).await;
                }
                Effect::Actuate(action) => {
                    if self.actions.send(action).await.is_err() {
                        warn!("actuation worker is gone; action dropped");
                    }
                }
            }
        }
    }
}

async fn actuation_worker(service: ActuationService, mut rx: mpsc::Receiver<Action>) {
    while let Some(action) = rx.recv().await {
        // Failures are logged by the service; the protocol reply has already gone out.
        let _ = service.execute(action).await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
