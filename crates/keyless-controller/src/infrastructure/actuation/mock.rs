//! Recording actuator for unit and integration tests.
//!
//! Captures every call instead of driving hardware, and can be told to fail
//! so error paths can be exercised.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{ActuationError, Actuator};

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActuatorCall {
    Activate(String, Duration),
    Blink(String, Duration),
}

/// A mock implementation of [`Actuator`] that records calls.
///
/// Cloning shares the same call log, so a test can keep one handle while the
/// service owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    calls: Arc<Mutex<Vec<ActuatorCall>>>,
    should_fail: bool,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an actuator whose every call fails.
    pub fn failing() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            should_fail: true,
        }
    }

    /// Returns a snapshot of all calls so far.
    pub fn calls(&self) -> Vec<ActuatorCall> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    fn record(&self, call: ActuatorCall, output: &str) -> Result<(), ActuationError> {
        self.calls.lock().expect("lock poisoned").push(call);
        if self.should_fail {
            return Err(ActuationError::Failed {
                output: output.to_string(),
                reason: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

impl Actuator for RecordingActuator {
    fn activate(&self, output: &str, duration: Duration) -> Result<(), ActuationError> {
        self.record(ActuatorCall::Activate(output.to_string(), duration), output)
    }

    fn blink(&self, output: &str, duration: Duration) -> Result<(), ActuationError> {
        self.record(ActuatorCall::Blink(output.to_string(), duration), output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_call_log() {
        let actuator = RecordingActuator::new();
        let handle = actuator.clone();

        actuator.activate("trunk", Duration::from_millis(1)).unwrap();

        assert_eq!(handle.calls().len(), 1);
    }

    #[test]
    fn test_failing_actuator_records_and_errors() {
        let actuator = RecordingActuator::failing();
        let result = actuator.blink("horn", Duration::from_millis(1));
        assert!(matches!(result, Err(ActuationError::Failed { .. })));
        assert_eq!(actuator.calls().len(), 1);
    }
}
