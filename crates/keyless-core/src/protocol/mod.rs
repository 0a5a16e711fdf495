//! Protocol module containing the text payload codec and challenge primitives.

pub mod challenge;
pub mod payload;

pub use challenge::{AuthError, Nonce, SharedSecret};
pub use payload::{Notification, ProtocolError, Request};
