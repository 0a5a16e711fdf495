//! Single state machine for the key.
//!
//! The runtime turns everything that happens to the key into a [`KeyEvent`]
//! and calls [`KeyAgent::handle`].  The agent answers with the payloads to
//! write to the controller, in order.  Time is passed in so tests can drive
//! the confirmation delay without sleeping.

use std::time::Instant;

use keyless_core::{Command, Notification, Request};
use tracing::{debug, error};

use crate::application::auto_trigger::{AutoTrigger, TriggerContext};
use crate::application::key_session::{KeySession, SessionUpdate};

/// Everything that can happen to the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEvent {
    /// The link to the controller is up.
    Connected,
    /// The link to the controller is gone.
    Disconnected,
    /// A line arrived from the controller.
    Notification(Notification),
    /// A raw signal-strength reading in dBm.
    Sample(i16),
    /// The user asked for a command.
    User(Command),
}

#[derive(Debug)]
pub struct KeyAgent {
    session: KeySession,
    trigger: AutoTrigger,
    connected: bool,
}

impl KeyAgent {
    pub fn new(session: KeySession, trigger: AutoTrigger) -> Self {
        Self {
            session,
            trigger,
            connected: false,
        }
    }

    pub fn handle(&mut self, event: KeyEvent, now: Instant) -> Vec<Request> {
        match event {
            KeyEvent::Connected => {
                self.connected = true;
                self.session.reset();
                self.trigger.reset();
                Vec::new()
            }
            KeyEvent::Disconnected => {
                self.connected = false;
                self.session.reset();
                self.trigger.reset();
                Vec::new()
            }
            KeyEvent::Notification(notification) => self.on_notification(&notification, now),
            KeyEvent::Sample(rssi) => self.on_sample(rssi, now),
            KeyEvent::User(command) => self.session.manual(command).into_iter().collect(),
        }
    }

    pub fn session(&self) -> &KeySession {
        &self.session
    }

    pub fn trigger(&self) -> &AutoTrigger {
        &self.trigger
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn on_notification(&mut self, notification: &Notification, now: Instant) -> Vec<Request> {
        match self.session.on_notification(notification) {
            Ok(SessionUpdate::Respond(reply)) => vec![reply],
            // Check proximity straight away instead of waiting for the next sample.
            Ok(SessionUpdate::Authenticated) => self.evaluate(now),
            Ok(update) => {
                debug!(?update, "session updated");
                Vec::new()
            }
            Err(e) => {
                error!("cannot answer challenge: {e}");
                Vec::new()
            }
        }
    }

    fn on_sample(&mut self, rssi: i16, now: Instant) -> Vec<Request> {
        if !self.connected {
            return Vec::new();
        }
        self.trigger.record(rssi);
        if !self.session.is_authenticated() {
            return Vec::new();
        }
        self.evaluate(now)
    }

    fn evaluate(&mut self, now: Instant) -> Vec<Request> {
        let ctx = TriggerContext {
            lock_state: self.session.lock_state(),
            manual_override: self.session.manual_override(),
        };
        self.trigger
            .evaluate(ctx, now)
            .map(Request::Command)
            .into_iter()
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
