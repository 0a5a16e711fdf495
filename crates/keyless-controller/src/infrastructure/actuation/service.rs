//! Serialized, busy-scoped execution of actions on a blocking worker.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{perform, ActuationError, Actuator};
use crate::application::command_gate::Action;

/// Marks the service busy for as long as it is alive.
///
/// The flag is cleared in `Drop`, so it is released even if the actuator
/// panics on the worker thread.
#[derive(Debug)]
pub struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    fn engage(flag: Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self { flag }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Runs actions one at a time on Tokio's blocking pool.
///
/// Cheap to clone; clones share the actuator, the busy flag and the queue.
#[derive(Clone)]
pub struct ActuationService {
    actuator: Arc<dyn Actuator>,
    busy: Arc<AtomicBool>,
    serial: Arc<Mutex<()>>,
}

impl ActuationService {
    pub fn new(actuator: Arc<dyn Actuator>) -> Self {
        Self {
            actuator,
            busy: Arc::new(AtomicBool::new(false)),
            serial: Arc::new(Mutex::new(())),
        }
    }

    /// `true` while an action is being performed.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Performs `action`, waiting for any earlier action to finish first.
    ///
    /// # Errors
    ///
    /// Returns the actuator's error, or [`ActuationError::WorkerFailed`] if
    /// the blocking task panicked.
    pub async fn execute(&self, action: Action) -> Result<(), ActuationError> {
        let _turn = self.serial.lock().await;
        let guard = BusyGuard::engage(Arc::clone(&self.busy));
        let actuator = Arc::clone(&self.actuator);
        debug!(output = %action.output, pattern = ?action.pattern, "actuation started");

        let result = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            perform(actuator.as_ref(), &action)
        })
        .await
        .map_err(|e| ActuationError::WorkerFailed(e.to_string()))?;

        if let Err(e) = &result {
            warn!("actuation failed: {e}");
        }
        result
    }
}

impl std::fmt::Debug for ActuationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActuationService")
            .field("busy", &self.is_busy())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
