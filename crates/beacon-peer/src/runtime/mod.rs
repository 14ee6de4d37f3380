/// Subscriber runtime: connection setup plus the heartbeat-monitored event
/// loop, owned by one explicit object per caller.
///
/// `setup` connects every configured peer and spawns the event loop as a
/// tokio task that takes ownership of all client handles. The caller keeps
/// a state watch, an optional event stream, and the shutdown path.
mod r#loop;
mod shutdown;

use beacon_transport::{signal_pair, KeyPair, PeerAddress, PublicKey, Transport};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::{PeerDescriptor, SubscriberConfig};
use crate::connection::{ConnectionId, ConnectionState};
use crate::dispatch::Dispatch;
use crate::establish::establish;
use crate::PeerError;

use self::r#loop::{subscriber_loop, LoopContext};
use self::shutdown::ShutdownSignal;

// ── Loop state ────────────────────────────────────────────────────────

/// Lifecycle of the event loop. Never returns to `Running` once draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopState {
    Initializing,
    Running,
    Draining,
    Terminated,
}

// ── Events (loop → caller) ────────────────────────────────────────────

/// Observations emitted by the event loop.
///
/// Delivered on a bounded channel without waiting; events are dropped when
/// the buffer is full or nobody took the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriberEvent {
    /// A message arrived and went through the dispatcher.
    Received {
        id: ConnectionId,
        peer: PublicKey,
        outcome: Dispatch,
    },
    /// A ready handle returned a receive error.
    ReceiveFailed {
        id: ConnectionId,
        peer: PublicKey,
        error: String,
    },
    /// A connection stayed silent past its deadline.
    Expired { id: ConnectionId, peer: PublicKey },
    /// Reconnect after expiry succeeded.
    Reconnected {
        id: ConnectionId,
        peer: PublicKey,
        state: ConnectionState,
    },
    /// Reconnect after expiry failed; retried at the next sweep.
    ReconnectFailed {
        id: ConnectionId,
        peer: PublicKey,
        state: ConnectionState,
        error: String,
    },
    /// A tracker entry without a connection was removed.
    Dropped { id: ConnectionId },
}

/// Counters collected by the event loop, returned once it terminates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopReport {
    pub messages: u64,
    pub receive_errors: u64,
    pub sweeps: u64,
    pub reconnects: u64,
    pub retries: u64,
    pub dropped: u64,
    pub connections_closed: usize,
}

/// A subscribed peer as configured at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerSummary {
    pub id: ConnectionId,
    pub public_key: PublicKey,
    pub address: PeerAddress,
}

// ── SubscriberRuntime ─────────────────────────────────────────────────

/// A running subscriber.
///
/// Dropping it without calling [`shutdown`](Self::shutdown) still stops the
/// event loop; its handles are closed in the background.
pub struct SubscriberRuntime {
    local_key: PublicKey,
    peers: Vec<PeerSummary>,
    state: watch::Receiver<LoopState>,
    events: Option<mpsc::Receiver<SubscriberEvent>>,
    shutdown: ShutdownSignal,
    task: JoinHandle<LoopReport>,
}

impl SubscriberRuntime {
    /// Connect every peer in `peers` and start the event loop.
    ///
    /// Must be called from within a tokio runtime. On error no task is
    /// spawned and every client created along the way has been closed.
    pub fn setup<T: Transport>(
        transport: &T,
        keys: &KeyPair,
        peers: &[PeerDescriptor],
        config: SubscriberConfig,
    ) -> Result<Self, PeerError> {
        tracing::info!(peers = peers.len(), domain = %config.domain_tag(), "initialising");

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PeerError::Runtime(e.to_string()))?;

        let connections = establish(transport, keys, peers, config.domain_tag())?;
        let summaries = connections
            .iter()
            .map(|c| PeerSummary {
                id: c.id(),
                public_key: *c.remote_key(),
                address: *c.address(),
            })
            .collect();

        let (push, pull) = signal_pair();
        let (state_tx, state_rx) = watch::channel(LoopState::Initializing);
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer);

        let task = runtime.spawn(subscriber_loop(LoopContext {
            connections,
            wake: pull,
            domain: config.domain.clone(),
            heartbeat_timeout: config.heartbeat_timeout(),
            state: state_tx,
            events: event_tx,
        }));
        let shutdown = ShutdownSignal::spawn(&runtime, push);

        Ok(Self {
            local_key: *keys.public(),
            peers: summaries,
            state: state_rx,
            events: Some(event_rx),
            shutdown,
            task,
        })
    }

    pub fn local_key(&self) -> &PublicKey {
        &self.local_key
    }

    pub fn peers(&self) -> &[PeerSummary] {
        &self.peers
    }

    /// Current loop state.
    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// A watch on the loop state, for waiting on transitions.
    pub fn state_watch(&self) -> watch::Receiver<LoopState> {
        self.state.clone()
    }

    /// Take the event stream. Only the first call returns it.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<SubscriberEvent>> {
        self.events.take()
    }

    /// Ask the loop to stop without waiting for it.
    ///
    /// Returns `true` for the call that actually sent the request.
    pub fn request_shutdown(&mut self) -> bool {
        self.shutdown.request()
    }

    /// Stop the loop and wait until it has closed every handle.
    pub async fn shutdown(mut self) -> Result<LoopReport, PeerError> {
        self.shutdown.request();
        let report = self.task.await?;
        self.shutdown.finished().await;
        tracing::info!(
            closed = report.connections_closed,
            messages = report.messages,
            "subscriber stopped"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for SubscriberRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRuntime")
            .field("local_key", &self.local_key)
            .field("peers", &self.peers)
            .field("state", &self.state())
            .finish()
    }
}
