//! Signal-strength sources.
//!
//! The key samples one RSSI reading (dBm) per sampling period.  On a phone
//! this comes from the radio stack; on a development host a
//! [`ScriptedSignal`] replays a configured sequence so walk-away and
//! approach scenarios can be reproduced.  Readings can also be injected by
//! hand from the console (`rssi -55`).

/// Anything that can produce a signal-strength reading on demand.
#[cfg_attr(test, mockall::automock)]
pub trait SignalSource: Send {
    /// Current reading, or `None` when nothing is available.
    fn sample(&mut self) -> Option<i16>;
}

/// Replays a fixed sequence of readings, starting over at the end.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSignal {
    samples: Vec<i16>,
    next: usize,
}

impl ScriptedSignal {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples, next: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl SignalSource for ScriptedSignal {
    fn sample(&mut self) -> Option<i16> {
        let value = *self.samples.get(self.next)?;
        self.next = (self.next + 1) % self.samples.len();
        Some(value)
    }
}
