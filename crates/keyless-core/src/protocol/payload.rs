//! Plain-text payloads exchanged between the key and the controller.
//!
//! Wire format: one UTF-8 text payload per write on the link.  Keywords are
//! case-insensitive and surrounding whitespace (including a trailing CR/LF
//! added by line-oriented transports) is ignored.
//!
//! ```text
//! key → controller                 controller → key
//! ────────────────                 ────────────────
//! LOCK | UNLOCK | TRUNK            CHALLENGE:<hex nonce>
//! LOCATE | ELIGHT                  AUTH_OK | AUTH_FAIL
//! RESP:<hex digest>                <ack text> | INVALID_COMMAND
//! ```

use std::fmt;

use thiserror::Error;

use crate::domain::command::Command;

pub const CHALLENGE_PREFIX: &str = "CHALLENGE:";
pub const RESPONSE_PREFIX: &str = "RESP:";
pub const AUTH_OK: &str = "AUTH_OK";
pub const AUTH_FAIL: &str = "AUTH_FAIL";
pub const INVALID_COMMAND: &str = "INVALID_COMMAND";

/// Errors that can occur while decoding a payload.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// A `CHALLENGE:` payload did not carry valid hex.
    #[error("malformed challenge hex: {0}")]
    MalformedChallenge(String),

    /// The payload was empty after trimming.
    #[error("empty payload")]
    Empty,
}

/// A payload written by the key on the command sub-channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// One of the five command keywords.
    Command(Command),
    /// Challenge response; the hex digest is passed through undecoded so the
    /// authenticator can treat garbled hex as a verification failure.
    Response(String),
    /// Anything else.  The controller answers `INVALID_COMMAND`.
    Unrecognized(String),
}

impl Request {
    /// Parses a command-channel payload.  Never fails: unknown text becomes
    /// [`Request::Unrecognized`].
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim();
        if let Some(digest) = strip_prefix_ignore_case(text, RESPONSE_PREFIX) {
            return Request::Response(digest.trim().to_string());
        }
        match text.parse::<Command>() {
            Ok(cmd) => Request::Command(cmd),
            Err(_) => Request::Unrecognized(text.to_string()),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Command(cmd) => f.write_str(cmd.as_str()),
            Request::Response(hex) => write!(f, "{RESPONSE_PREFIX}{hex}"),
            Request::Unrecognized(text) => f.write_str(text),
        }
    }
}

/// A payload written by the controller on the response/notification sub-channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Random nonce to be answered with `RESP:<hmac>`.
    Challenge(Vec<u8>),
    AuthOk,
    AuthFail,
    /// Human-readable acknowledgement of an executed command.
    Ack(String),
    InvalidCommand,
}

impl Notification {
    /// Parses a response-channel payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Empty`] for blank payloads and
    /// [`ProtocolError::MalformedChallenge`] for a challenge whose nonce is
    /// not valid hex.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(ProtocolError::Empty);
        }
        if let Some(nonce_hex) = strip_prefix_ignore_case(text, CHALLENGE_PREFIX) {
            let nonce = hex::decode(nonce_hex.trim())
                .map_err(|e| ProtocolError::MalformedChallenge(e.to_string()))?;
            if nonce.is_empty() {
                return Err(ProtocolError::MalformedChallenge("empty nonce".to_string()));
            }
            return Ok(Notification::Challenge(nonce));
        }
        if text.eq_ignore_ascii_case(AUTH_OK) {
            Ok(Notification::AuthOk)
        } else if text.eq_ignore_ascii_case(AUTH_FAIL) {
            Ok(Notification::AuthFail)
        } else if text.eq_ignore_ascii_case(INVALID_COMMAND) {
            Ok(Notification::InvalidCommand)
        } else {
            Ok(Notification::Ack(text.to_string()))
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Challenge(nonce) => write!(f, "{CHALLENGE_PREFIX}{}", hex::encode(nonce)),
            Notification::AuthOk => f.write_str(AUTH_OK),
            Notification::AuthFail => f.write_str(AUTH_FAIL),
            Notification::Ack(text) => f.write_str(text),
            Notification::InvalidCommand => f.write_str(INVALID_COMMAND),
        }
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Request ───────────────────────────────────────────────────────────────

    #[test]
    fn test_request_parses_command_keywords_case_insensitively() {
        assert_eq!(Request::parse("unlock\r\n"), Request::Command(Command::Unlock));
        assert_eq!(Request::parse("Trunk"), Request::Command(Command::Trunk));
    }

    #[test]
    fn test_request_parses_response_with_lowercase_prefix() {
        assert_eq!(
            Request::parse("resp:AbCd01"),
            Request::Response("AbCd01".to_string())
        );
    }

    #[test]
    fn test_request_keeps_garbled_response_text_for_verification() {
        assert_eq!(Request::parse("RESP:zz"), Request::Response("zz".to_string()));
        assert_eq!(Request::parse("RESP:"), Request::Response(String::new()));
    }

    #[test]
    fn test_request_unknown_text_is_unrecognized() {
        assert_eq!(
            Request::parse("OPEN SESAME"),
            Request::Unrecognized("OPEN SESAME".to_string())
        );
    }

    #[test]
    fn test_request_display_writes_wire_form() {
        assert_eq!(Request::Command(Command::Locate).to_string(), "LOCATE");
        assert_eq!(Request::Response("ab".into()).to_string(), "RESP:ab");
    }

    // ── Notification ──────────────────────────────────────────────────────────

    #[test]
    fn test_notification_parses_challenge_hex_in_either_case() {
        assert_eq!(
            Notification::parse("CHALLENGE:AABBcc").unwrap(),
            Notification::Challenge(vec![0xAA, 0xBB, 0xCC])
        );
        assert_eq!(
            Notification::parse("challenge:0102").unwrap(),
            Notification::Challenge(vec![0x01, 0x02])
        );
    }

    #[test]
    fn test_notification_rejects_garbled_challenge() {
        assert!(matches!(
            Notification::parse("CHALLENGE:xyz"),
            Err(ProtocolError::MalformedChallenge(_))
        ));
        assert!(matches!(
            Notification::parse("CHALLENGE:"),
            Err(ProtocolError::MalformedChallenge(_))
        ));
    }

    #[test]
    fn test_notification_parses_status_keywords() {
        assert_eq!(Notification::parse("AUTH_OK").unwrap(), Notification::AuthOk);
        assert_eq!(Notification::parse("auth_fail").unwrap(), Notification::AuthFail);
        assert_eq!(
            Notification::parse("INVALID_COMMAND\n").unwrap(),
            Notification::InvalidCommand
        );
    }

    #[test]
    fn test_notification_other_text_is_ack() {
        assert_eq!(
            Notification::parse("Door Locked").unwrap(),
            Notification::Ack("Door Locked".to_string())
        );
    }

    #[test]
    fn test_notification_empty_payload_is_error() {
        assert_eq!(Notification::parse("  \r\n"), Err(ProtocolError::Empty));
    }

    #[test]
    fn test_notification_challenge_display_uses_lowercase_hex() {
        let n = Notification::Challenge(vec![0xAA, 0x0F]);
        assert_eq!(n.to_string(), "CHALLENGE:aa0f");
    }

    #[test]
    fn test_strip_prefix_handles_short_and_multibyte_input() {
        assert_eq!(strip_prefix_ignore_case("RE", RESPONSE_PREFIX), None);
        assert_eq!(strip_prefix_ignore_case("ÄÖÜ", RESPONSE_PREFIX), None);
    }
}
