/// Connection establisher: one outbound client per configured peer.
///
/// Setup is all-or-nothing: clients are collected in a cleanup scope that
/// closes every one of them unless the whole list connects.
use beacon_transport::{KeyPair, PeerAddress, PublicKey, SubscriberClient, Transport};

use crate::config::PeerDescriptor;
use crate::connection::{ConnectionId, PeerConnection};
use crate::PeerError;

/// Create and connect one client per descriptor, in order.
pub fn establish<T: Transport>(
    transport: &T,
    keys: &KeyPair,
    peers: &[PeerDescriptor],
    domain: &str,
) -> Result<Vec<PeerConnection<T::Client>>, PeerError> {
    if peers.is_empty() {
        tracing::error!("zero connections are available");
        return Err(PeerError::NoConnectionsAvailable);
    }

    let mut pending = PendingClients::with_capacity(peers.len());

    for (index, peer) in peers.iter().enumerate() {
        let address: PeerAddress = peer.subscribe.parse().map_err(|source| {
            tracing::error!(address = %peer.subscribe, error = %source, "client connection fail");
            PeerError::InvalidAddress {
                address: peer.subscribe.clone(),
                source,
            }
        })?;

        let remote_key = PublicKey::from_hex(&peer.public_key).map_err(|source| {
            tracing::error!(public_key = %peer.public_key, error = %source, "decode public key fail");
            PeerError::InvalidPublicKey {
                public_key: peer.public_key.clone(),
                source,
            }
        })?;

        if &remote_key == keys.public() {
            tracing::error!(public_key = %remote_key, "connect to self");
            return Err(PeerError::SelfConnectionForbidden {
                public_key: remote_key.to_hex(),
            });
        }

        let client = transport.new_client(keys).map_err(|e| {
            tracing::error!(client = %peer.subscribe, error = %e, "create client fail");
            e
        })?;

        let connection = pending.push(PeerConnection::new(
            ConnectionId::new(index),
            remote_key,
            address,
            client,
        ));
        connection
            .client_mut()
            .connect(&address, &remote_key, domain)
            .map_err(|e| {
                tracing::error!(client = %peer.subscribe, error = %e, "connect fail");
                e
            })?;

        tracing::info!(
            public_key = %remote_key,
            subscribe = %address,
            connect = %peer.connect,
            "subscribed to peer"
        );
    }

    Ok(pending.complete())
}

/// Clients created so far in one setup call.
///
/// Dropping the scope closes them all; [`complete`](Self::complete) hands
/// them over instead.
struct PendingClients<C: SubscriberClient> {
    connections: Vec<PeerConnection<C>>,
}

impl<C: SubscriberClient> PendingClients<C> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            connections: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, connection: PeerConnection<C>) -> &mut PeerConnection<C> {
        self.connections.push(connection);
        let last = self.connections.len() - 1;
        &mut self.connections[last]
    }

    fn complete(mut self) -> Vec<PeerConnection<C>> {
        std::mem::take(&mut self.connections)
    }
}

impl<C: SubscriberClient> Drop for PendingClients<C> {
    fn drop(&mut self) {
        for connection in &mut self.connections {
            tracing::debug!(client = %connection.basic_info(), "closing client after failed setup");
            if let Err(e) = connection.close() {
                tracing::warn!(client = %connection.basic_info(), error = %e, "close fail");
            }
        }
    }
}
