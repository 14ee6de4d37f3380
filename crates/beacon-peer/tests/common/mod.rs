//! In-memory transport for driving the subscriber runtime in tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use beacon_peer::PeerDescriptor;
use beacon_transport::{
    BeaconTransportError, KeyPair, Multipart, PeerAddress, PublicKey, SubscriberClient, Transport,
};
use tokio::sync::mpsc;

type Inbound = Result<Multipart, BeaconTransportError>;

/// What happened to one client created by [`MockTransport`].
#[derive(Debug, Clone, Default)]
pub struct ClientRecord {
    pub address: Option<PeerAddress>,
    pub server_key: Option<PublicKey>,
    pub domain: Option<String>,
    pub connected: bool,
    pub connects: usize,
    pub reconnects: usize,
    pub close_calls: usize,
}

#[derive(Default)]
struct MockState {
    clients: Vec<ClientRecord>,
    senders: Vec<mpsc::UnboundedSender<Inbound>>,
    fail_new_client_at: Option<usize>,
    fail_connect_at: Option<usize>,
    fail_reconnect: bool,
}

/// Transport whose clients are fed through channels held by the test.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn fail_new_client_at(&self, index: usize) {
        self.lock().fail_new_client_at = Some(index);
    }

    pub fn fail_connect_at(&self, index: usize) {
        self.lock().fail_connect_at = Some(index);
    }

    pub fn fail_reconnect(&self, fail: bool) {
        self.lock().fail_reconnect = fail;
    }

    pub fn set_connected(&self, index: usize, connected: bool) {
        self.lock().clients[index].connected = connected;
    }

    pub fn client_count(&self) -> usize {
        self.lock().clients.len()
    }

    pub fn record(&self, index: usize) -> ClientRecord {
        self.lock().clients[index].clone()
    }

    pub fn records(&self) -> Vec<ClientRecord> {
        self.lock().clients.clone()
    }

    pub fn reconnects(&self) -> Vec<usize> {
        self.lock().clients.iter().map(|c| c.reconnects).collect()
    }

    /// Deliver a message to client `index`, prefixed with `envelope`.
    pub fn deliver(&self, index: usize, envelope: &str, frames: &[&[u8]]) {
        let mut message = Multipart::new().with(envelope.as_bytes().to_vec());
        for frame in frames {
            message.push(frame.to_vec());
        }
        self.lock().senders[index].send(Ok(message)).unwrap();
    }

    /// Make client `index` report a receive error.
    pub fn deliver_error(&self, index: usize, error: BeaconTransportError) {
        self.lock().senders[index].send(Err(error)).unwrap();
    }
}

impl Transport for MockTransport {
    type Client = MockClient;

    fn new_client(&self, _keys: &KeyPair) -> Result<MockClient, BeaconTransportError> {
        let mut state = self.lock();
        let index = state.clients.len();
        if state.fail_new_client_at == Some(index) {
            return Err(BeaconTransportError::Runtime("client creation refused".into()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.clients.push(ClientRecord::default());
        state.senders.push(tx);
        Ok(MockClient {
            index,
            state: self.state.clone(),
            rx,
            closed: false,
        })
    }
}

pub struct MockClient {
    index: usize,
    state: Arc<Mutex<MockState>>,
    rx: mpsc::UnboundedReceiver<Inbound>,
    closed: bool,
}

impl MockClient {
    fn with_record<R>(&self, f: impl FnOnce(&mut MockState, usize) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state, self.index)
    }
}

impl SubscriberClient for MockClient {
    fn connect(
        &mut self,
        address: &PeerAddress,
        server_key: &PublicKey,
        domain: &str,
    ) -> Result<(), BeaconTransportError> {
        self.with_record(|state, index| {
            let record = &mut state.clients[index];
            record.connects += 1;
            if state.fail_connect_at == Some(index) {
                return Err(BeaconTransportError::NotConnected);
            }
            let record = &mut state.clients[index];
            record.address = Some(*address);
            record.server_key = Some(*server_key);
            record.domain = Some(domain.to_string());
            record.connected = true;
            Ok(())
        })
    }

    fn is_connected(&self) -> bool {
        !self.closed && self.with_record(|state, index| state.clients[index].connected)
    }

    fn reconnect(&mut self) -> Result<(), BeaconTransportError> {
        if self.closed {
            return Err(BeaconTransportError::Closed);
        }
        self.with_record(|state, index| {
            state.clients[index].reconnects += 1;
            if state.fail_reconnect {
                Err(BeaconTransportError::NotConnected)
            } else {
                Ok(())
            }
        })
    }

    fn close(&mut self) -> Result<(), BeaconTransportError> {
        self.with_record(|state, index| state.clients[index].close_calls += 1);
        if self.closed {
            return Err(BeaconTransportError::Closed);
        }
        self.closed = true;
        Ok(())
    }

    fn basic_info(&self) -> String {
        format!("mock client {}", self.index)
    }

    fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Inbound> {
        if self.closed {
            return Poll::Pending;
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(item)) => Poll::Ready(item),
            _ => Poll::Pending,
        }
    }
}

/// `count` descriptors for fresh remote keys, on consecutive ports.
pub fn descriptors(count: usize) -> Vec<PeerDescriptor> {
    (0..count)
        .map(|n| PeerDescriptor {
            public_key: KeyPair::generate().public().to_hex(),
            subscribe: format!("127.0.0.1:{}", 2135 + 10 * n),
            connect: format!("127.0.0.1:{}", 2136 + 10 * n),
        })
        .collect()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
