/// A subscribed remote peer and its transport client.
use std::fmt;

use beacon_transport::{BeaconTransportError, PeerAddress, PublicKey, SubscriberClient};

/// Identity of a registered connection.
///
/// Assigned in descriptor order at setup; keys both the connection table
/// and the expiry tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(usize);

impl ConnectionId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Liveness state of a connection as seen by the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connect or reconnect issued, no traffic seen since.
    Connecting,
    /// Traffic received since the last (re)connect.
    Connected,
    /// Deadline passed without traffic; awaiting a successful reconnect.
    Expired,
}

/// Result of [`PeerConnection::revive`].
#[derive(Debug)]
pub(crate) enum Revival {
    Reconnected,
    /// The client reports itself disconnected; nothing was attempted.
    NotConnected,
    Failed(BeaconTransportError),
}

/// A subscribed remote peer.
pub struct PeerConnection<C> {
    id: ConnectionId,
    remote_key: PublicKey,
    address: PeerAddress,
    client: C,
    state: ConnectionState,
}

impl<C: SubscriberClient> PeerConnection<C> {
    pub(crate) fn new(id: ConnectionId, remote_key: PublicKey, address: PeerAddress, client: C) -> Self {
        Self {
            id,
            remote_key,
            address,
            client,
            state: ConnectionState::Connecting,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn remote_key(&self) -> &PublicKey {
        &self.remote_key
    }

    pub fn address(&self) -> &PeerAddress {
        &self.address
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub(crate) fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub fn basic_info(&self) -> String {
        self.client.basic_info()
    }

    pub(crate) fn mark_received(&mut self) {
        self.state = ConnectionState::Connected;
    }

    /// Handle a missed deadline: mark the connection expired, then
    /// reconnect if the client still reports itself connected.
    ///
    /// Only a successful reconnect leaves `Expired`.
    pub(crate) fn revive(&mut self) -> Revival {
        self.state = ConnectionState::Expired;
        if !self.client.is_connected() {
            return Revival::NotConnected;
        }
        match self.client.reconnect() {
            Ok(()) => {
                self.state = ConnectionState::Connecting;
                Revival::Reconnected
            }
            Err(e) => Revival::Failed(e),
        }
    }

    pub(crate) fn close(&mut self) -> Result<(), BeaconTransportError> {
        self.client.close()
    }
}

impl<C> fmt::Debug for PeerConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerConnection")
            .field("id", &self.id)
            .field("remote_key", &self.remote_key)
            .field("address", &self.address)
            .field("state", &self.state)
            .finish()
    }
}
