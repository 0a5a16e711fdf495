//! Line-based user input from stdin.
//!
//! ```text
//! lock | unlock | trunk | locate | elight   send a command
//! rssi <dBm>                                inject a signal reading
//! ```

use keyless_core::Command;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// One parsed console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserInput {
    Command(Command),
    Rssi(i16),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("empty input")]
    Empty,
    #[error("unknown command {0:?}; expected lock, unlock, trunk, locate, elight or rssi <dBm>")]
    Unknown(String),
    #[error("invalid signal reading {0:?}")]
    InvalidRssi(String),
}

/// Parses one console line.
pub fn parse_input(line: &str) -> Result<UserInput, InputError> {
    let mut words = line.split_whitespace();
    let first = words.next().ok_or(InputError::Empty)?;

    if first.eq_ignore_ascii_case("rssi") {
        let value = words.next().unwrap_or_default();
        return value
            .parse()
            .map(UserInput::Rssi)
            .map_err(|_| InputError::InvalidRssi(value.to_string()));
    }
    first
        .parse::<Command>()
        .map(UserInput::Command)
        .map_err(|_| InputError::Unknown(first.to_string()))
}

/// Reads `reader` line by line and forwards parsed input until EOF.
pub async fn forward_input<R>(reader: R, tx: mpsc::Sender<UserInput>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("console read error: {e}");
                break;
            }
        };
        match parse_input(&line) {
            Ok(input) => {
                if tx.send(input).await.is_err() {
                    break;
                }
            }
            Err(InputError::Empty) => {}
            Err(e) => warn!("{e}"),
        }
    }
    debug!("console input closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands_case_insensitively() {
        assert_eq!(parse_input("unlock"), Ok(UserInput::Command(Command::Unlock)));
        assert_eq!(parse_input("  ELIGHT "), Ok(UserInput::Command(Command::Elight)));
    }

    #[test]
    fn test_parse_rssi() {
        assert_eq!(parse_input("rssi -55"), Ok(UserInput::Rssi(-55)));
        assert_eq!(
            parse_input("rssi loud"),
            Err(InputError::InvalidRssi("loud".to_string()))
        );
        assert_eq!(parse_input("rssi"), Err(InputError::InvalidRssi(String::new())));
    }

    #[test]
    fn test_parse_rejects_unknown_and_blank() {
        assert_eq!(parse_input("   "), Err(InputError::Empty));
        assert_eq!(parse_input("honk"), Err(InputError::Unknown("honk".to_string())));
    }

    #[tokio::test]
    async fn test_forward_input_skips_bad_lines() {
        // Arrange
        let input: &[u8] = b"lock\nhonk\n\nrssi -70\n";
        let (tx, mut rx) = mpsc::channel(8);

        // Act
        forward_input(input, tx).await;

        // Assert
        assert_eq!(rx.recv().await, Some(UserInput::Command(Command::Lock)));
        assert_eq!(rx.recv().await, Some(UserInput::Rssi(-70)));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_forward_input_joins_lines_split_across_reads() {
        // Arrange: a terminal delivering one line in two chunks
        let stdin = tokio_test::io::Builder::new()
            .read(b"unl")
            .read(b"ock\nrssi -4")
            .read(b"2\n")
            .build();
        let (tx, mut rx) = mpsc::channel(8);

        // Act
        forward_input(tokio::io::BufReader::new(stdin), tx).await;

        // Assert
        assert_eq!(rx.recv().await, Some(UserInput::Command(Command::Unlock)));
        assert_eq!(rx.recv().await, Some(UserInput::Rssi(-42)));
        assert_eq!(rx.recv().await, None);
    }
}
