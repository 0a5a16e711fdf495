//! Integration tests for the keyless-core payload codec and challenge helpers.
//!
//! These tests walk a complete challenge exchange through the public API the
//! way the two devices use it: the controller formats a `CHALLENGE:` payload,
//! the key parses it and answers with `RESP:`, and the controller parses and
//! verifies that answer.

use keyless_core::{AuthError, Command, Nonce, Notification, Request, SharedSecret};

/// Runs one exchange and returns the controller's verification result.
fn exchange(controller_secret: &str, key_secret: &str) -> Result<(), AuthError> {
    let controller = SharedSecret::new(controller_secret).expect("valid secret");
    let key = SharedSecret::new(key_secret).expect("valid secret");

    // controller → key
    let nonce = Nonce::random();
    let wire = Notification::Challenge(nonce.as_bytes().to_vec()).to_string();

    // key side
    let received = match Notification::parse(&wire).expect("challenge must parse") {
        Notification::Challenge(bytes) => bytes,
        other => panic!("expected a challenge, got {other:?}"),
    };
    let answer = Request::Response(key.respond(&received).expect("respond")).to_string();

    // controller side
    match Request::parse(&answer) {
        Request::Response(hex) => controller.verify(nonce.as_bytes(), &hex),
        other => panic!("expected a response, got {other:?}"),
    }
}

#[test]
fn test_exchange_with_matching_secret_verifies() {
    assert_eq!(exchange("car-secret", "car-secret"), Ok(()));
}

#[test]
fn test_exchange_with_wrong_secret_is_rejected() {
    assert_eq!(exchange("car-secret", "guess"), Err(AuthError::Mismatch));
}

#[test]
fn test_commands_survive_the_wire_in_any_case() {
    for cmd in Command::ALL {
        let lower = cmd.as_str().to_lowercase();
        assert_eq!(Request::parse(&lower), Request::Command(cmd));
        assert_eq!(Request::parse(&Request::Command(cmd).to_string()), Request::Command(cmd));
    }
}

#[test]
fn test_ack_texts_are_not_mistaken_for_status_keywords() {
    for ack in ["Door Locked", "Door Unlocked", "Trunk Released"] {
        assert_eq!(
            Notification::parse(ack).expect("ack parses"),
            Notification::Ack(ack.to_string())
        );
    }
}
