//! The key and the controller talking over a real loopback link.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use keyless_controller::application::access_control::{AccessControl, AdmissionPolicy};
use keyless_controller::application::command_gate::CommandGate;
use keyless_controller::application::controller::Controller;
use keyless_controller::application::lockout::LockoutPolicy;
use keyless_controller::application::whitelist::Whitelist;
use keyless_controller::infrastructure::actuation::mock::{ActuatorCall, RecordingActuator};
use keyless_controller::infrastructure::actuation::service::ActuationService;
use keyless_controller::infrastructure::link::tcp::{LinkConfig, LinkServer};
use keyless_controller::infrastructure::link::PeerRegistry;
use keyless_controller::infrastructure::runtime::ControllerRuntime;
use keyless_controller::infrastructure::storage::kv_store::MemoryStore;
use keyless_core::{Command, LockState, PeerIdentity, ProximityFilter, SharedSecret, Thresholds};
use keyless_key::application::agent::KeyAgent;
use keyless_key::application::auto_trigger::AutoTrigger;
use keyless_key::application::key_session::{AckTexts, KeySession};
use keyless_key::infrastructure::console::UserInput;
use keyless_key::infrastructure::network::{KeyConnection, KeyConnectionConfig};
use keyless_key::infrastructure::runtime::KeyRuntime;
use keyless_key::infrastructure::signal::ScriptedSignal;
use tokio::sync::mpsc;

const SECRET: &str = "end-to-end-secret";
const PASSKEY: &str = "112233";

async fn start_controller(
    secret: &str,
    running: &Arc<AtomicBool>,
) -> (std::net::SocketAddr, RecordingActuator) {
    let access = AccessControl::new(
        SharedSecret::new(secret).unwrap(),
        AdmissionPolicy::Immediate,
        LockoutPolicy::default(),
        Whitelist::load(Box::new(MemoryStore::new())).unwrap(),
    );
    let controller = Controller::new(access, CommandGate::default(), Duration::from_secs(3));
    let registry = PeerRegistry::new();
    let (events_tx, events_rx) = mpsc::channel(32);
    let server = LinkServer::bind(
        LinkConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            passkey: PASSKEY.to_string(),
            pairing_timeout: Duration::from_secs(2),
        },
        registry.clone(),
        events_tx,
    )
    .await
    .unwrap();
    let addr = server.local_addr().unwrap();
    let actuator = RecordingActuator::new();
    let runtime = ControllerRuntime::new(
        controller,
        registry,
        ActuationService::new(Arc::new(actuator.clone())),
        Duration::from_millis(20),
    );
    tokio::spawn(server.run(Arc::clone(running)));
    tokio::spawn(runtime.run(events_rx, Arc::clone(running)));
    (addr, actuator)
}

fn key_runtime(
    addr: std::net::SocketAddr,
    secret: &str,
    script: Vec<i16>,
    running: &Arc<AtomicBool>,
) -> (KeyRuntime, mpsc::Receiver<keyless_key::infrastructure::network::NetworkEvent>) {
    let agent = KeyAgent::new(
        KeySession::new(SharedSecret::new(secret).unwrap(), AckTexts::default()),
        AutoTrigger::new(
            ProximityFilter::new(3, Thresholds::new(-60, -75).unwrap()).unwrap(),
            Duration::from_millis(200),
        ),
    );
    let connection = Arc::new(KeyConnection::new(KeyConnectionConfig {
        controller_addr: addr,
        peer_id: PeerIdentity::new("phone-1"),
        passkey: PASSKEY.to_string(),
        initial_backoff: Duration::from_millis(50),
        max_backoff: Duration::from_millis(200),
    }));
    let network = Arc::clone(&connection).start(Arc::clone(running));
    let runtime = KeyRuntime::new(
        agent,
        connection,
        Box::new(ScriptedSignal::new(script)),
        Duration::from_millis(20),
    );
    (runtime, network)
}

#[tokio::test]
async fn test_key_auto_unlocks_then_user_locks() {
    // Arrange
    let running = Arc::new(AtomicBool::new(true));
    let (addr, actuator) = start_controller(SECRET, &running).await;
    let (runtime, network) = key_runtime(addr, SECRET, vec![-45], &running);
    let (user_tx, user_rx) = mpsc::channel(4);
    let key = tokio::spawn(runtime.run(network, user_rx, Arc::clone(&running)));

    // Act: let proximity unlock, then lock by hand
    tokio::time::sleep(Duration::from_millis(500)).await;
    user_tx.send(UserInput::Command(Command::Lock)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    running.store(false, Ordering::Relaxed);
    let agent = key.await.unwrap();

    // Assert
    let calls = actuator.calls();
    assert_eq!(
        calls.first(),
        Some(&ActuatorCall::Activate(
            "door_unlock".to_string(),
            Duration::from_millis(500)
        ))
    );
    assert_eq!(
        calls.last(),
        Some(&ActuatorCall::Activate(
            "door_lock".to_string(),
            Duration::from_millis(500)
        ))
    );
    assert_eq!(agent.session().lock_state(), LockState::Locked);
    assert!(agent.session().manual_override());
}

#[tokio::test]
async fn test_key_with_wrong_secret_never_actuates() {
    let running = Arc::new(AtomicBool::new(true));
    let (addr, actuator) = start_controller(SECRET, &running).await;
    let (runtime, network) = key_runtime(addr, "not-the-secret", vec![-45], &running);
    let (_user_tx, user_rx) = mpsc::channel(4);
    let key = tokio::spawn(runtime.run(network, user_rx, Arc::clone(&running)));

    tokio::time::sleep(Duration::from_millis(400)).await;
    running.store(false, Ordering::Relaxed);
    let agent = key.await.unwrap();

    assert!(actuator.calls().is_empty());
    assert!(!agent.session().is_authenticated());
}
