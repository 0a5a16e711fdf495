//! Line-delimited TCP link used in place of the radio on development hosts.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use keyless_core::PeerIdentity;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::{LinkError, Outbound, PairRequest, PeerRegistry};
use crate::application::controller::Event;

/// Outbound queue depth per connection.
const OUTBOUND_CAPACITY: usize = 16;

/// How often the accept loop re-checks the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// A peer that does not take a line within this time is disconnected.
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for the TCP link.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub bind_addr: SocketAddr,
    /// Passkey every key must present in its `PAIR:` line.
    pub passkey: String,
    /// How long a new connection may take to send its `PAIR:` line.
    pub pairing_timeout: Duration,
}

/// Accepts key connections and turns them into controller events.
pub struct LinkServer {
    listener: TcpListener,
    config: Arc<LinkConfig>,
    registry: PeerRegistry,
    events: mpsc::Sender<Event>,
}

impl LinkServer {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::BindFailed`] if the address is unavailable.
    pub async fn bind(
        config: LinkConfig,
        registry: PeerRegistry,
        events: mpsc::Sender<Event>,
    ) -> Result<Self, LinkError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| LinkError::BindFailed {
                addr: config.bind_addr,
                source,
            })?;
        Ok(Self {
            listener,
            config: Arc::new(config),
            registry,
            events,
        })
    }

    /// The address actually bound (useful when binding port 0 in tests).
    pub fn local_addr(&self) -> Result<SocketAddr, LinkError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until `running` is cleared.
    pub async fn run(self, running: Arc<AtomicBool>) {
        info!("link listening on {}", self.config.bind_addr);
        while running.load(Ordering::Relaxed) {
            match timeout(ACCEPT_POLL, self.listener.accept()).await {
                Ok(Ok((stream, addr))) => {
                    debug!("connection from {addr}");
                    let config = Arc::clone(&self.config);
                    let registry = self.registry.clone();
                    let events = self.events.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, addr, config, registry, events).await;
                    });
                }
                Ok(Err(e)) => error!("accept error: {e}"),
                Err(_) => {}
            }
        }
        info!("link accept loop stopped");
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    config: Arc<LinkConfig>,
    registry: PeerRegistry,
    events: mpsc::Sender<Event>,
) {
    match run_connection(stream, addr, &config, &registry, &events).await {
        Ok(()) => debug!("connection from {addr} closed"),
        Err(e) => warn!("connection from {addr} ended: {e}"),
    }
}

async fn run_connection(
    stream: TcpStream,
    addr: SocketAddr,
    config: &LinkConfig,
    registry: &PeerRegistry,
    events: &mpsc::Sender<Event>,
) -> Result<(), LinkError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let first = timeout(config.pairing_timeout, lines.next_line())
        .await
        .map_err(|_| LinkError::PairingTimeout)??;
    let Some(first) = first else {
        return Ok(());
    };
    let pair = PairRequest::parse(&first)?;
    let peer = pair.peer;

    if pair.passkey != config.passkey {
        warn!(%peer, %addr, "pairing passkey mismatch");
        let _ = events.send(Event::LinkFailed { peer }).await;
        return Ok(());
    }

    let (tx, mut rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let id = registry.register(&peer, tx).await?;
    info!(%peer, %addr, "link paired");

    let result = if events
        .send(Event::LinkAuthenticated { peer: peer.clone() })
        .await
        .is_ok()
    {
        pump(&peer, &mut lines, &mut write_half, &mut rx, events).await
    } else {
        Ok(())
    };

    registry.unregister(&peer, id).await;
    let _ = events.send(Event::Disconnected { peer }).await;
    result
}

/// Moves lines in both directions until either side closes.
async fn pump(
    peer: &PeerIdentity,
    lines: &mut Lines<BufReader<OwnedReadHalf>>,
    writer: &mut OwnedWriteHalf,
    outbound: &mut mpsc::Receiver<Outbound>,
    events: &mpsc::Sender<Event>,
) -> Result<(), LinkError> {
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                if line.trim().is_empty() {
                    continue;
                }
                if events.send(Event::from_payload(peer.clone(), &line)).await.is_err() {
                    return Ok(());
                }
            }
            msg = outbound.recv() => match msg {
                Some(Outbound::Send(notification)) => {
                    let line = format!("{notification}\n");
                    timeout(WRITE_TIMEOUT, writer.write_all(line.as_bytes()))
                        .await
                        .map_err(|_| LinkError::WriteTimeout)??;
                }
                Some(Outbound::Close) | None => {
                    debug!(%peer, "closing connection");
                    return Ok(());
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use keyless_core::Notification;

    async fn start(passkey: &str) -> (SocketAddr, PeerRegistry, mpsc::Receiver<Event>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::channel(16);
        let registry = PeerRegistry::new();
        let config = LinkConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            passkey: passkey.to_string(),
            pairing_timeout: Duration::from_secs(2),
        };
        let server = LinkServer::bind(config, registry.clone(), tx).await.unwrap();
        let addr = server.local_addr().unwrap();
        let running = Arc::new(AtomicBool::new(true));
        tokio::spawn(server.run(Arc::clone(&running)));
        (addr, registry, rx, running)
    }

    #[tokio::test]
    async fn test_pairing_with_correct_passkey_emits_link_authenticated() {
        // Arrange
        let (addr, registry, mut events, running) = start("123456").await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        // Act
        stream.write_all(b"PAIR:key-1:123456\nLOCK\n").await.unwrap();

        // Assert
        let peer = PeerIdentity::new("key-1");
        assert_eq!(
            events.recv().await,
            Some(Event::LinkAuthenticated { peer: peer.clone() })
        );
        assert_eq!(
            events.recv().await,
            Some(Event::CommandReceived {
                peer: peer.clone(),
                payload: "LOCK".to_string()
            })
        );
        assert_eq!(registry.len().await, 1);

        drop(stream);
        assert_eq!(events.recv().await, Some(Event::Disconnected { peer }));
        running.store(false, Ordering::Relaxed);
    }

    #[tokio::test]
    async fn test_wrong_passkey_emits_link_failed() {
        let (addr, registry, mut events, running) = start("123456").await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        stream.write_all(b"PAIR:key-1:000000\n").await.unwrap();

        assert_eq!(
            events.recv().await,
            Some(Event::LinkFailed {
                peer: PeerIdentity::new("key-1")
            })
        );
        assert!(registry.is_empty().await);
        running.store(false, Ordering::Relaxed);
    }

    #[tokio::test]
    async fn test_outbound_notifications_are_written_as_lines() {
        // Arrange
        let (addr, registry, mut events, running) = start("123456").await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        write_half.write_all(b"PAIR:key-1:123456\n").await.unwrap();
        let peer = PeerIdentity::new("key-1");
        assert!(matches!(events.recv().await, Some(Event::LinkAuthenticated { .. })));

        // Act
        registry
            .deliver(&peer, Outbound::Send(Notification::AuthOk))
            .await;

        // Assert
        let mut lines = BufReader::new(read_half).lines();
        assert_eq!(lines.next_line().await.unwrap(), Some("AUTH_OK".to_string()));

        registry.deliver(&peer, Outbound::Close).await;
        assert_eq!(lines.next_line().await.unwrap(), None);
        running.store(false, Ordering::Relaxed);
    }
}
