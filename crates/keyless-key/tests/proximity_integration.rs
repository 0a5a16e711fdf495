//! Proximity behaviour of the key agent over longer synthetic traces.
//!
//! Samples arrive one per second as they would from the radio; acks are fed
//! back immediately after every command so the agent's lock belief follows
//! what a controller would report.

use std::time::{Duration, Instant};

use keyless_core::{Command, LockState, Notification, ProximityFilter, Request, SharedSecret, Thresholds};
use keyless_key::application::agent::{KeyAgent, KeyEvent};
use keyless_key::application::auto_trigger::{AutoTrigger, DEFAULT_CONFIRMATION_DELAY};
use keyless_key::application::key_session::{AckTexts, KeySession};

const UNLOCK: i16 = -60;
const LOCK: i16 = -75;

fn authenticated_agent(now: Instant) -> KeyAgent {
    let session = KeySession::new(SharedSecret::new("trace-secret").unwrap(), AckTexts::default());
    let filter = ProximityFilter::new(5, Thresholds::new(UNLOCK, LOCK).unwrap()).unwrap();
    let mut agent = KeyAgent::new(session, AutoTrigger::new(filter, DEFAULT_CONFIRMATION_DELAY));
    agent.handle(KeyEvent::Connected, now);
    agent.handle(KeyEvent::Notification(Notification::Challenge(vec![9; 32])), now);
    agent.handle(KeyEvent::Notification(Notification::AuthOk), now);
    agent
}

/// Feeds `trace` at one sample per second, acking each command like a controller.
fn replay(agent: &mut KeyAgent, start: Instant, trace: &[i16]) -> Vec<Command> {
    let acks = AckTexts::default();
    let mut sent = Vec::new();
    for (i, &rssi) in trace.iter().enumerate() {
        let now = start + Duration::from_secs(i as u64);
        for request in agent.handle(KeyEvent::Sample(rssi), now) {
            let Request::Command(command) = request else {
                continue;
            };
            let ack = match command {
                Command::Lock => acks.locked.clone(),
                Command::Unlock => acks.unlocked.clone(),
                other => other.as_str().to_string(),
            };
            agent.handle(KeyEvent::Notification(Notification::Ack(ack)), now);
            sent.push(command);
        }
    }
    sent
}

#[test]
fn test_in_band_oscillation_triggers_nothing_after_settle() {
    // Arrange: settle near the car, then hover inside the band for a minute
    let start = Instant::now();
    let mut agent = authenticated_agent(start);
    let mut trace = vec![-50; 5];
    for i in 0..60 {
        trace.push(if i % 2 == 0 { UNLOCK - 1 } else { LOCK + 1 });
    }

    // Act
    let sent = replay(&mut agent, start, &trace);

    // Assert: only the initial unlock
    assert_eq!(sent, vec![Command::Unlock]);
    assert_eq!(agent.session().lock_state(), LockState::Unlocked);
}

#[test]
fn test_walk_away_and_return_cycles_lock_state() {
    // Arrange
    let start = Instant::now();
    let mut agent = authenticated_agent(start);
    let mut trace = Vec::new();
    trace.extend([-50; 6]); // beside the car
    trace.extend([-68; 4]); // stepping back, inside the band
    trace.extend([-88; 8]); // gone
    trace.extend([-48; 8]); // back again

    // Act
    let sent = replay(&mut agent, start, &trace);

    // Assert
    assert_eq!(sent, vec![Command::Unlock, Command::Lock, Command::Unlock]);
    assert_eq!(agent.session().lock_state(), LockState::Unlocked);
}

#[test]
fn test_single_sample_spikes_do_not_trigger() {
    let start = Instant::now();
    let mut agent = authenticated_agent(start);
    let trace = [-90, -90, -40, -90, -90, -90, -35, -90, -90, -90];

    let sent = replay(&mut agent, start, &trace);

    assert!(sent.is_empty(), "unexpected commands: {sent:?}");
}

#[test]
fn test_manual_lock_holds_until_manual_unlock() {
    // Arrange
    let start = Instant::now();
    let mut agent = authenticated_agent(start);
    replay(&mut agent, start, &[-50; 5]);
    let later = start + Duration::from_secs(10);
    agent.handle(KeyEvent::User(Command::Lock), later);
    agent.handle(
        KeyEvent::Notification(Notification::Ack("Door Locked".to_string())),
        later,
    );

    // Act: still beside the car
    let held = replay(&mut agent, later, &[-50; 10]);
    agent.handle(KeyEvent::User(Command::Unlock), later + Duration::from_secs(20));

    // Assert
    assert!(held.is_empty());
    assert!(!agent.session().manual_override());
}
