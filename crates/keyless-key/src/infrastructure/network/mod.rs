//! Network infrastructure for the key.
//!
//! Handles the line-oriented TCP link to the controller and forwards inbound
//! [`Notification`]s to the runtime.
//!
//! Architecture:
//! - `KeyConnection` owns the write half of the current stream, if any.
//! - A background task connects, sends the `PAIR:` line, reads lines and
//!   emits [`NetworkEvent`]s on an `mpsc` channel.
//! - When the link drops or cannot be opened the task waits according to a
//!   [`Backoff`] (1 s doubling up to 60 s) and tries again.  A successful
//!   connection resets the delay.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use keyless_core::{Notification, PeerIdentity, Request};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{tcp::OwnedReadHalf, tcp::OwnedWriteHalf, TcpStream},
    sync::{mpsc, Mutex},
    time,
};
use tracing::{debug, error, info, warn};

/// Errors that can occur in the key network layer.
#[derive(Debug, Error)]
pub enum KeyNetworkError {
    /// TCP connection to the controller failed.
    #[error("failed to connect to controller at {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// An I/O error occurred on the established connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// There is no live connection to write to.
    #[error("not connected to controller")]
    NotConnected,
}

/// Configuration for the key's connection.
#[derive(Debug, Clone)]
pub struct KeyConnectionConfig {
    /// Address of the controller's link port.
    pub controller_addr: SocketAddr,
    /// Identity presented in the `PAIR:` line.
    pub peer_id: PeerIdentity,
    /// Link-level passkey presented in the `PAIR:` line.
    pub passkey: String,
    /// First reconnect delay.
    pub initial_backoff: Duration,
    /// Upper bound for the reconnect delay.
    pub max_backoff: Duration,
}

impl Default for KeyConnectionConfig {
    fn default() -> Self {
        Self {
            controller_addr: SocketAddr::from(([127, 0, 0, 1], 24900)),
            peer_id: PeerIdentity::new("keyless-key"),
            passkey: "123456".to_string(),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// Events emitted by the network layer to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// The link is up and the `PAIR:` line has been sent.
    Connected { controller_addr: SocketAddr },
    /// A notification was received from the controller.
    Received(Notification),
    /// The link was lost.
    Disconnected,
}

/// Capped exponential reconnect delay.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Returns the delay to wait now and doubles the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Manages the TCP link from the key to the controller.
pub struct KeyConnection {
    config: KeyConnectionConfig,
    write_half: Arc<Mutex<Option<OwnedWriteHalf>>>,
}

impl KeyConnection {
    /// Creates a new (not yet connected) `KeyConnection`.
    pub fn new(config: KeyConnectionConfig) -> Self {
        Self {
            config,
            write_half: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts the reconnect loop in the background.
    ///
    /// Returns a channel receiver that delivers [`NetworkEvent`]s.  The loop
    /// runs until `running` is cleared or the receiver is dropped.
    pub fn start(self: Arc<Self>, running: Arc<AtomicBool>) -> mpsc::Receiver<NetworkEvent> {
        let (tx, rx) = mpsc::channel(64);
        let this = Arc::clone(&self);

        tokio::spawn(async move {
            let mut backoff = Backoff::new(this.config.initial_backoff, this.config.max_backoff);
            let addr = this.config.controller_addr;

            while running.load(Ordering::Relaxed) && !tx.is_closed() {
                match this.connect().await {
                    Ok(read_half) => {
                        backoff.reset();
                        info!("connected to controller at {addr}");
                        if tx
                            .send(NetworkEvent::Connected {
                                controller_addr: addr,
                            })
                            .await
                            .is_err()
                        {
                            break;
                        }

                        this.read_loop(read_half, &tx).await;

                        *this.write_half.lock().await = None;
                        let _ = tx.send(NetworkEvent::Disconnected).await;
                    }
                    Err(e) => warn!("{e}"),
                }

                if running.load(Ordering::Relaxed) {
                    let delay = backoff.next_delay();
                    info!("reconnecting in {delay:?}");
                    time::sleep(delay).await;
                }
            }
            debug!("reconnect loop stopped");
        });

        rx
    }

    /// Opens the stream and sends the pairing line.
    async fn connect(&self) -> Result<OwnedReadHalf, KeyNetworkError> {
        let addr = self.config.controller_addr;
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| KeyNetworkError::ConnectFailed { addr, source })?;
        let (read_half, mut write_half) = stream.into_split();
        let pair = format!("PAIR:{}:{}\n", self.config.peer_id, self.config.passkey);
        write_half.write_all(pair.as_bytes()).await?;
        *self.write_half.lock().await = Some(write_half);
        Ok(read_half)
    }

    /// Reads lines until the controller closes the link.
    async fn read_loop(&self, reader: OwnedReadHalf, tx: &mpsc::Sender<NetworkEvent>) {
        let mut lines = BufReader::new(reader).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    error!("read error on link: {e}");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match Notification::parse(&line) {
                Ok(notification) => {
                    if tx.send(NetworkEvent::Received(notification)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("ignoring malformed notification: {e}"),
            }
        }
    }

    /// Writes one request line to the controller.
    ///
    /// # Errors
    ///
    /// Returns [`KeyNetworkError::NotConnected`] between connections and
    /// [`KeyNetworkError::Io`] if the write fails.
    pub async fn send(&self, request: &Request) -> Result<(), KeyNetworkError> {
        let mut guard = self.write_half.lock().await;
        let writer = guard.as_mut().ok_or(KeyNetworkError::NotConnected)?;
        writer.write_all(format!("{request}\n").as_bytes()).await?;
        debug!(%request, "sent");
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.write_half.lock().await.is_some()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use keyless_core::Command;
    use tokio::net::TcpListener;

    #[test]
    fn test_backoff_doubles_up_to_cap_and_resets() {
        // Arrange
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));

        // Act
        let delays: Vec<u64> = (0..8).map(|_| backoff.next_delay().as_secs()).collect();
        backoff.reset();

        // Assert
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 60, 60]);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_default_config_uses_controller_port() {
        let cfg = KeyConnectionConfig::default();
        assert_eq!(cfg.controller_addr.port(), 24900);
        assert_eq!(cfg.initial_backoff, Duration::from_secs(1));
        assert_eq!(cfg.max_backoff, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_send_without_connection_fails() {
        let conn = KeyConnection::new(KeyConnectionConfig::default());
        let result = conn.send(&Request::Command(Command::Lock)).await;
        assert!(matches!(result, Err(KeyNetworkError::NotConnected)));
    }

    #[tokio::test]
    async fn test_connection_pairs_and_relays_lines() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let conn = Arc::new(KeyConnection::new(KeyConnectionConfig {
            controller_addr: addr,
            peer_id: PeerIdentity::new("aa:bb:cc:dd:ee:01"),
            passkey: "999999".to_string(),
            ..Default::default()
        }));
        let running = Arc::new(AtomicBool::new(true));

        // Act
        let mut events = Arc::clone(&conn).start(Arc::clone(&running));
        let (server, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = server.into_split();
        let mut lines = BufReader::new(read_half).lines();

        // Assert
        assert_eq!(
            lines.next_line().await.unwrap(),
            Some("PAIR:aa:bb:cc:dd:ee:01:999999".to_string())
        );
        assert_eq!(
            events.recv().await,
            Some(NetworkEvent::Connected {
                controller_addr: addr
            })
        );

        write_half.write_all(b"AUTH_OK\n\nnonsense-ack\n").await.unwrap();
        assert_eq!(
            events.recv().await,
            Some(NetworkEvent::Received(Notification::AuthOk))
        );
        assert_eq!(
            events.recv().await,
            Some(NetworkEvent::Received(Notification::Ack(
                "nonsense-ack".to_string()
            )))
        );

        conn.send(&Request::Command(Command::Trunk)).await.unwrap();
        assert_eq!(lines.next_line().await.unwrap(), Some("TRUNK".to_string()));

        running.store(false, Ordering::Relaxed);
        drop(write_half);
        drop(lines);
        assert_eq!(events.recv().await, Some(NetworkEvent::Disconnected));
    }
}
