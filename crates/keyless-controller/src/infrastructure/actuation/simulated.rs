//! Log-only actuator used on development machines without GPIO.
//!
//! Each call logs the output transition and then sleeps for the requested
//! duration so timing behaves like real hardware.

use std::collections::HashSet;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::{ActuationError, Actuator};

/// Half-period of the blink pattern.
pub const BLINK_HALF_PERIOD: Duration = Duration::from_millis(250);

/// Actuator that only logs.
#[derive(Debug, Clone)]
pub struct SimulatedActuator {
    outputs: HashSet<String>,
}

impl SimulatedActuator {
    /// Creates a simulator that accepts exactly the given output names.
    pub fn new<I, S>(outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            outputs: outputs.into_iter().map(Into::into).collect(),
        }
    }

    fn check(&self, output: &str) -> Result<(), ActuationError> {
        if self.outputs.contains(output) {
            Ok(())
        } else {
            Err(ActuationError::UnknownOutput(output.to_string()))
        }
    }
}

impl Actuator for SimulatedActuator {
    fn activate(&self, output: &str, duration: Duration) -> Result<(), ActuationError> {
        self.check(output)?;
        info!(output, duration_ms = duration.as_millis() as u64, "output on");
        thread::sleep(duration);
        info!(output, "output off");
        Ok(())
    }

    fn blink(&self, output: &str, duration: Duration) -> Result<(), ActuationError> {
        self.check(output)?;
        info!(output, duration_ms = duration.as_millis() as u64, "blink start");
        let start = Instant::now();
        let mut on = true;
        while start.elapsed() < duration {
            debug!(output, on, "blink");
            let left = duration.saturating_sub(start.elapsed());
            thread::sleep(left.min(BLINK_HALF_PERIOD));
            on = !on;
        }
        info!(output, "blink end");
        Ok(())
    }
}
