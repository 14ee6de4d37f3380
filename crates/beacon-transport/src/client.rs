use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::CurveConfig;
use crate::protocol;
use crate::{BeaconTransportError, KeyPair, Multipart, PeerAddress, PublicKey};

/// Capability set of one outbound subscriber connection.
///
/// Handles are owned by a single task; none of the methods may be called
/// concurrently.
pub trait SubscriberClient: Send + 'static {
    /// Start connecting to `address`, authenticating it as `server_key` on
    /// the network identified by `domain`.
    fn connect(
        &mut self,
        address: &PeerAddress,
        server_key: &PublicKey,
        domain: &str,
    ) -> Result<(), BeaconTransportError>;

    /// Whether the client has a live connect target (connected and not closed).
    fn is_connected(&self) -> bool;

    /// Drop the current session and connect again to the same target.
    fn reconnect(&mut self) -> Result<(), BeaconTransportError>;

    /// Release the connection. Later calls fail with `Closed`.
    fn close(&mut self) -> Result<(), BeaconTransportError>;

    /// Short human-readable description for logs.
    fn basic_info(&self) -> String;

    /// Poll for the next inbound multipart message.
    fn poll_recv(&mut self, cx: &mut Context<'_>)
        -> Poll<Result<Multipart, BeaconTransportError>>;
}

/// Factory for clients bound to a local identity.
pub trait Transport: Send + Sync + 'static {
    type Client: SubscriberClient;

    fn new_client(&self, keys: &KeyPair) -> Result<Self::Client, BeaconTransportError>;
}

/// Encrypted TCP transport (X25519 handshake, XChaCha20-Poly1305 frames).
#[derive(Debug, Clone, Default)]
pub struct CurveTransport {
    config: CurveConfig,
}

impl CurveTransport {
    pub fn new(config: CurveConfig) -> Self {
        Self { config }
    }
}

impl Transport for CurveTransport {
    type Client = CurveClient;

    fn new_client(&self, keys: &KeyPair) -> Result<CurveClient, BeaconTransportError> {
        Ok(CurveClient {
            keys: keys.clone(),
            config: self.config.clone(),
            target: None,
            session: None,
            closed: false,
        })
    }
}

#[derive(Debug, Clone)]
struct Target {
    address: PeerAddress,
    server_key: PublicKey,
    domain: String,
}

/// A running session: background connect + read task feeding a channel.
struct Session {
    task: JoinHandle<()>,
    rx: mpsc::Receiver<Result<Multipart, BeaconTransportError>>,
    finished: bool,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Subscriber client of [`CurveTransport`].
///
/// `connect` and `reconnect` return as soon as the session task is spawned;
/// the TCP connect and handshake happen in the background. A failed or
/// ended session reports its error once through `poll_recv` and then stays
/// silent until `reconnect`.
pub struct CurveClient {
    keys: KeyPair,
    config: CurveConfig,
    target: Option<Target>,
    session: Option<Session>,
    closed: bool,
}

impl std::fmt::Debug for CurveClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurveClient")
            .field("target", &self.target)
            .field("closed", &self.closed)
            .finish()
    }
}

impl CurveClient {
    fn start_session(&mut self) -> Result<(), BeaconTransportError> {
        let target = self.target.clone().ok_or(BeaconTransportError::NotConnected)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| BeaconTransportError::Runtime(e.to_string()))?;

        let (tx, rx) = mpsc::channel(self.config.recv_buffer);
        let task = runtime.spawn(run_session(
            target,
            self.keys.clone(),
            self.config.max_frame_size,
            tx,
        ));

        // Replacing the old session aborts its task.
        self.session = Some(Session {
            task,
            rx,
            finished: false,
        });
        Ok(())
    }
}

impl SubscriberClient for CurveClient {
    fn connect(
        &mut self,
        address: &PeerAddress,
        server_key: &PublicKey,
        domain: &str,
    ) -> Result<(), BeaconTransportError> {
        if self.closed {
            return Err(BeaconTransportError::Closed);
        }
        self.target = Some(Target {
            address: *address,
            server_key: *server_key,
            domain: domain.to_string(),
        });
        self.start_session()
    }

    fn is_connected(&self) -> bool {
        !self.closed && self.target.is_some()
    }

    fn reconnect(&mut self) -> Result<(), BeaconTransportError> {
        if self.closed {
            return Err(BeaconTransportError::Closed);
        }
        self.session = None;
        self.start_session()
    }

    fn close(&mut self) -> Result<(), BeaconTransportError> {
        if self.closed {
            return Err(BeaconTransportError::Closed);
        }
        self.closed = true;
        self.session = None;
        Ok(())
    }

    fn basic_info(&self) -> String {
        match &self.target {
            Some(target) => format!(
                "server: {} public key: {}",
                target.address, target.server_key
            ),
            None => "unconnected client".to_string(),
        }
    }

    fn poll_recv(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Multipart, BeaconTransportError>> {
        let Some(session) = self.session.as_mut() else {
            return Poll::Pending;
        };
        if session.finished {
            return Poll::Pending;
        }
        match session.rx.poll_recv(cx) {
            Poll::Ready(Some(item)) => Poll::Ready(item),
            Poll::Ready(None) => {
                session.finished = true;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

async fn run_session(
    target: Target,
    keys: KeyPair,
    max_frame_size: usize,
    tx: mpsc::Sender<Result<Multipart, BeaconTransportError>>,
) {
    if let Err(e) = session(&target, &keys, max_frame_size, &tx).await {
        tracing::debug!(server = %target.address, error = %e, "session ended");
        let _ = tx.send(Err(e)).await;
    }
}

async fn session(
    target: &Target,
    keys: &KeyPair,
    max_frame_size: usize,
    tx: &mpsc::Sender<Result<Multipart, BeaconTransportError>>,
) -> Result<(), BeaconTransportError> {
    let mut stream = TcpStream::connect(target.address.socket_addr())
        .await
        .map_err(|e| BeaconTransportError::Connect {
            address: target.address,
            source: e.into(),
        })?;
    let _ = stream.set_nodelay(true);

    let keys = protocol::client_handshake(&mut stream, keys, &target.server_key, &target.domain)
        .await?;
    tracing::debug!(server = %target.address, "session established");

    loop {
        let sealed = protocol::read_frame(&mut stream, max_frame_size).await?;
        let plaintext = keys.inbound.open(&sealed)?;
        let message = Multipart::decode(Bytes::from(plaintext))?;
        if tx.send(Ok(message)).await.is_err() {
            // Client dropped the session.
            return Ok(());
        }
    }
}
