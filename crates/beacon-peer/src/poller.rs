/// Readiness poller over the wake handle and every peer client.
use std::collections::BTreeMap;
use std::future::poll_fn;
use std::task::Poll;
use std::time::Duration;

use beacon_transport::{BeaconTransportError, Multipart, SignalPull, SubscriberClient};
use bytes::Bytes;
use tokio::time::Instant;

use crate::connection::{ConnectionId, PeerConnection};

/// One ready handle.
#[derive(Debug)]
pub enum Ready {
    /// The wake handle fired. `None` means its push half is gone.
    Wake(Option<Bytes>),
    /// A peer client produced a message or a receive error.
    Message {
        id: ConnectionId,
        result: Result<Multipart, BeaconTransportError>,
    },
}

/// Waits for the first ready handle, bounded by a fixed timeout and by the
/// tracker's next check, whichever comes first.
///
/// The wake handle is checked first so a stop request is never starved by
/// a busy peer. Peers are scanned round-robin from the one after the last
/// that was ready.
#[derive(Debug)]
pub struct Poller {
    timeout: Duration,
    cursor: ConnectionId,
}

impl Poller {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            cursor: ConnectionId::new(0),
        }
    }

    /// Returns `None` when nothing became ready before the deadline.
    pub async fn poll<C: SubscriberClient>(
        &mut self,
        wake: &mut SignalPull,
        connections: &mut BTreeMap<ConnectionId, PeerConnection<C>>,
        check_at: Instant,
    ) -> Option<Ready> {
        let deadline = Instant::now()
            .checked_add(self.timeout)
            .map_or(check_at, |limit| check_at.min(limit));
        let cursor = &mut self.cursor;
        let ready = poll_fn(|cx| {
            if let Poll::Ready(signal) = wake.poll_signal(cx) {
                return Poll::Ready(Ready::Wake(signal));
            }

            let start = *cursor;
            for (&id, connection) in connections.range_mut(start..) {
                if let Poll::Ready(result) = connection.client_mut().poll_recv(cx) {
                    *cursor = ConnectionId::new(id.index() + 1);
                    return Poll::Ready(Ready::Message { id, result });
                }
            }
            for (&id, connection) in connections.range_mut(..start) {
                if let Poll::Ready(result) = connection.client_mut().poll_recv(cx) {
                    *cursor = ConnectionId::new(id.index() + 1);
                    return Poll::Ready(Ready::Message { id, result });
                }
            }
            Poll::Pending
        });

        tokio::time::timeout_at(deadline, ready).await.ok()
    }
}
