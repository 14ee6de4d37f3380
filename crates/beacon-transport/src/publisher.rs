use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::config::CurveConfig;
use crate::protocol;
use crate::{BeaconTransportError, KeyPair, Multipart, PeerAddress, PublicKey};

/// Publisher side of the beacon transport.
///
/// Accepts subscribers on a TCP listener, authenticates them with the
/// server handshake, and broadcasts every published message to all of
/// them. Each message goes out with the network domain tag as its leading
/// envelope frame.
pub struct CurvePublisher {
    local_addr: PeerAddress,
    public_key: PublicKey,
    domain: String,
    broadcast_tx: broadcast::Sender<Bytes>,
    subscribers: watch::Receiver<usize>,
    accept_task: JoinHandle<()>,
}

struct PublisherState {
    keys: KeyPair,
    domain: String,
    max_frame_size: usize,
    subscribers: watch::Sender<usize>,
}

impl CurvePublisher {
    /// Bind a publisher for `domain` on `addr` (port 0 picks a free port).
    pub async fn bind(
        addr: SocketAddr,
        keys: KeyPair,
        domain: &str,
        config: CurveConfig,
    ) -> Result<Self, BeaconTransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BeaconTransportError::Bind(e.into()))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| BeaconTransportError::Bind(e.into()))?;

        let (broadcast_tx, _) = broadcast::channel(config.send_buffer);
        let (subscribers_tx, subscribers) = watch::channel(0usize);
        let public_key = *keys.public();

        let state = Arc::new(PublisherState {
            keys,
            domain: domain.to_string(),
            max_frame_size: config.max_frame_size,
            subscribers: subscribers_tx,
        });
        let accept_task = tokio::spawn(accept_loop(listener, state, broadcast_tx.clone()));

        tracing::info!(address = %local_addr, domain, "publisher listening");

        Ok(Self {
            local_addr: PeerAddress::from(local_addr),
            public_key,
            domain: domain.to_string(),
            broadcast_tx,
            subscribers,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> PeerAddress {
        self.local_addr
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Number of subscribers that completed the handshake.
    pub fn subscriber_count(&self) -> usize {
        *self.subscribers.borrow()
    }

    /// Wait until at least `count` subscribers are attached.
    pub async fn wait_for_subscribers(&self, count: usize) {
        let mut subscribers = self.subscribers.clone();
        let _ = subscribers.wait_for(|n| *n >= count).await;
    }

    /// Broadcast `message` to every attached subscriber.
    ///
    /// Returns the number of subscribers it was queued for.
    pub fn publish(&self, message: Multipart) -> Result<usize, BeaconTransportError> {
        let encoded = message.wrap(self.domain.clone()).encode()?;
        Ok(self.broadcast_tx.send(encoded).unwrap_or(0))
    }

    /// Stop accepting and disconnect every subscriber.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for CurvePublisher {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    state: Arc<PublisherState>,
    broadcast_tx: broadcast::Sender<Bytes>,
) {
    loop {
        let (stream, remote) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };
        // Subscribe before the handshake so nothing published after the
        // subscriber is counted can be missed.
        let rx = broadcast_tx.subscribe();
        tokio::spawn(serve_subscriber(stream, remote, state.clone(), rx));
    }
}

async fn serve_subscriber(
    mut stream: TcpStream,
    remote: SocketAddr,
    state: Arc<PublisherState>,
    mut rx: broadcast::Receiver<Bytes>,
) {
    let _ = stream.set_nodelay(true);
    let (client_key, session) =
        match protocol::server_handshake(&mut stream, &state.keys, &state.domain).await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(%remote, error = %e, "subscriber handshake failed");
                return;
            }
        };
    tracing::info!(%remote, client = %client_key, "subscriber attached");
    state.subscribers.send_modify(|n| *n += 1);

    loop {
        let message = match rx.recv().await {
            Ok(message) => message,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(%remote, skipped, "subscriber lagging, messages dropped");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let sealed = match session.outbound.seal(&message) {
            Ok(sealed) => sealed,
            Err(e) => {
                tracing::error!(%remote, error = %e, "seal failed");
                break;
            }
        };
        if sealed.len() > state.max_frame_size {
            tracing::warn!(%remote, size = sealed.len(), "message exceeds frame limit, dropped");
            continue;
        }
        if let Err(e) = protocol::write_frame(&mut stream, &sealed).await {
            tracing::debug!(%remote, error = %e, "subscriber detached");
            break;
        }
    }

    state.subscribers.send_modify(|n| *n = n.saturating_sub(1));
}
