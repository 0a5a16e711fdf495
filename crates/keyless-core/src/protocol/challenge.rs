//! HMAC-SHA256 challenge-response primitives.
//!
//! # How the challenge works (for beginners)
//!
//! The link layer already encrypts traffic, but it only proves that *some*
//! device finished pairing.  To prove that the device is a genuine key, the
//! controller sends a fresh random [`Nonce`] and the key answers with
//! `HMAC-SHA256(secret, nonce)` encoded as hex.  Only a holder of the
//! [`SharedSecret`] can produce the right digest, and because the nonce is
//! new every time, a recorded answer is useless for the next attempt.
//!
//! ```text
//! controller                               key
//!     │── CHALLENGE:<64 hex chars> ──────────▶│
//!     │                                      │ digest = HMAC(secret, nonce)
//!     │◀──────────────── RESP:<64 hex chars> ─│
//!     │ verify_response(...)                  │
//! ```
//!
//! Digest comparison uses [`Mac::verify_slice`], which runs in constant time.

use std::fmt;

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Nonce length in bytes.
pub const NONCE_LEN: usize = 32;

/// Length in bytes of an HMAC-SHA256 digest.
pub const DIGEST_LEN: usize = 32;

/// Errors raised while producing or checking a challenge digest.
///
/// Every variant except [`AuthError::EmptySecret`] is an ordinary
/// verification failure: the controller counts it against the peer and
/// keeps running.
#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    /// The shared secret must contain at least one byte.
    #[error("shared secret is empty")]
    EmptySecret,

    /// The response was not valid hex.
    #[error("response digest is not valid hex: {0}")]
    MalformedDigest(String),

    /// The response decoded to the wrong number of bytes.
    #[error("response digest has {actual} bytes, expected {expected}")]
    DigestLength { expected: usize, actual: usize },

    /// The digest did not match the expected HMAC.
    #[error("response digest does not match")]
    Mismatch,

    /// The MAC implementation rejected the key.
    #[error("invalid HMAC key: {0}")]
    InvalidKey(String),
}

/// Random single-use challenge value.
#[derive(Clone, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_LEN]);

impl Nonce {
    /// Draws a fresh nonce from the operating system's CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lower-case hex form used in `CHALLENGE:` payloads.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

// Nonces are never written to logs in full.
impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Nonce(..)")
    }
}

/// Pre-shared secret both devices are provisioned with.
#[derive(Clone)]
pub struct SharedSecret(Vec<u8>);

impl SharedSecret {
    /// Wraps raw secret bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::EmptySecret`] when `bytes` is empty.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, AuthError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(AuthError::EmptySecret);
        }
        Ok(Self(bytes))
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(&self.0).map_err(|e| AuthError::InvalidKey(e.to_string()))
    }

    /// Computes the raw HMAC-SHA256 of `message`.
    pub fn digest(&self, message: &[u8]) -> Result<[u8; DIGEST_LEN], AuthError> {
        let mut mac = self.mac()?;
        mac.update(message);
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(&mac.finalize().into_bytes());
        Ok(out)
    }

    /// Produces the lower-case hex answer to a challenge nonce.
    pub fn respond(&self, nonce: &[u8]) -> Result<String, AuthError> {
        Ok(hex::encode(self.digest(nonce)?))
    }

    /// Checks a hex-encoded response against the expected HMAC of `nonce`.
    ///
    /// Hex is accepted in either case.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MalformedDigest`] if `response_hex` is not hex.
    /// - [`AuthError::DigestLength`] if it decodes to anything but 32 bytes.
    /// - [`AuthError::Mismatch`] if the digest is wrong.
    pub fn verify(&self, nonce: &[u8], response_hex: &str) -> Result<(), AuthError> {
        let provided = hex::decode(response_hex.trim())
            .map_err(|e| AuthError::MalformedDigest(e.to_string()))?;
        if provided.len() != DIGEST_LEN {
            return Err(AuthError::DigestLength {
                expected: DIGEST_LEN,
                actual: provided.len(),
            });
        }
        let mut mac = self.mac()?;
        mac.update(nonce);
        mac.verify_slice(&provided).map_err(|_| AuthError::Mismatch)
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedSecret({} bytes)", self.0.len())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> SharedSecret {
        SharedSecret::new("s3cret-key").unwrap()
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        assert_eq!(SharedSecret::new("").unwrap_err(), AuthError::EmptySecret);
    }

    #[test]
    fn test_random_nonces_differ() {
        let a = Nonce::random();
        let b = Nonce::random();
        assert_ne!(a, b, "two 32-byte nonces from the OS RNG should never collide");
        assert_eq!(a.to_hex().len(), NONCE_LEN * 2);
    }

    #[test]
    fn test_known_hmac_vector() {
        // RFC 4231 test case 2
        let secret = SharedSecret::new("Jefe").unwrap();
        let answer = secret.respond(b"what do ya want for nothing?").unwrap();
        assert_eq!(
            answer,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_correct_response_verifies() {
        // Arrange
        let nonce = Nonce::random();
        let answer = secret().respond(nonce.as_bytes()).unwrap();

        // Act / Assert
        assert_eq!(secret().verify(nonce.as_bytes(), &answer), Ok(()));
    }

    #[test]
    fn test_upper_case_response_verifies() {
        let nonce = Nonce::from_bytes([7u8; NONCE_LEN]);
        let answer = secret().respond(nonce.as_bytes()).unwrap().to_uppercase();
        assert_eq!(secret().verify(nonce.as_bytes(), &answer), Ok(()));
    }

    #[test]
    fn test_response_from_wrong_secret_is_mismatch() {
        let nonce = Nonce::random();
        let other = SharedSecret::new("not-the-secret").unwrap();
        let answer = other.respond(nonce.as_bytes()).unwrap();
        assert_eq!(
            secret().verify(nonce.as_bytes(), &answer),
            Err(AuthError::Mismatch)
        );
    }

    #[test]
    fn test_response_for_other_nonce_is_mismatch() {
        let first = Nonce::from_bytes([1u8; NONCE_LEN]);
        let second = Nonce::from_bytes([2u8; NONCE_LEN]);
        let stale = secret().respond(first.as_bytes()).unwrap();
        assert_eq!(
            secret().verify(second.as_bytes(), &stale),
            Err(AuthError::Mismatch)
        );
    }

    #[test]
    fn test_garbled_hex_is_malformed() {
        let nonce = Nonce::random();
        assert!(matches!(
            secret().verify(nonce.as_bytes(), "not hex at all"),
            Err(AuthError::MalformedDigest(_))
        ));
    }

    #[test]
    fn test_short_digest_reports_length() {
        let nonce = Nonce::random();
        assert_eq!(
            secret().verify(nonce.as_bytes(), "abcd"),
            Err(AuthError::DigestLength {
                expected: DIGEST_LEN,
                actual: 2
            })
        );
    }

    #[test]
    fn test_debug_output_hides_material() {
        let nonce = Nonce::from_bytes([0xAB; NONCE_LEN]);
        assert_eq!(format!("{nonce:?}"), "Nonce(..)");
        assert_eq!(format!("{:?}", secret()), "SharedSecret(10 bytes)");
    }
}
