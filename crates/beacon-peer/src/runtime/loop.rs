/// The subscriber event loop.
///
/// A single task owns every client handle, the wake pull and the expiry
/// tracker. It waits for the first ready handle (bounded by the heartbeat
/// timeout), sweeps the tracker when due, then handles what woke it.
use std::collections::BTreeMap;
use std::time::Duration;

use beacon_transport::{BeaconTransportError, Multipart, SignalPull, SubscriberClient};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::connection::{ConnectionId, PeerConnection, Revival};
use crate::dispatch::{dispatch, Dispatch};
use crate::expiry::{ExpiredAction, ExpiryTracker};
use crate::poller::{Poller, Ready};

use super::{LoopReport, LoopState, SubscriberEvent};

/// Everything the loop task takes ownership of.
pub(super) struct LoopContext<C> {
    pub connections: Vec<PeerConnection<C>>,
    pub wake: SignalPull,
    pub domain: String,
    pub heartbeat_timeout: Duration,
    pub state: watch::Sender<LoopState>,
    pub events: mpsc::Sender<SubscriberEvent>,
}

pub(super) async fn subscriber_loop<C: SubscriberClient>(ctx: LoopContext<C>) -> LoopReport {
    let LoopContext {
        connections,
        mut wake,
        domain,
        heartbeat_timeout,
        state,
        events,
    } = ctx;

    tracing::info!(connections = connections.len(), "start to run");

    // ── Registration ────────────────────────────────────────────────
    let now = Instant::now();
    let mut tracker = ExpiryTracker::new(heartbeat_timeout, now);
    let mut table: BTreeMap<ConnectionId, PeerConnection<C>> = BTreeMap::new();
    for connection in connections {
        tracker.register(connection.id(), now);
        table.insert(connection.id(), connection);
    }
    let mut poller = Poller::new(heartbeat_timeout);
    let mut report = LoopReport::default();

    set_state(&state, LoopState::Running);

    // ── Main loop ───────────────────────────────────────────────────
    loop {
        let ready = poller.poll(&mut wake, &mut table, tracker.check_at()).await;

        let now = Instant::now();
        if tracker.is_due(now) {
            sweep(&mut tracker, &mut table, &events, &mut report, now);
        }

        match ready {
            None => tracing::debug!("poll timeout"),
            Some(Ready::Wake(signal)) => {
                match signal {
                    Some(_) => tracing::info!("receive terminate signal"),
                    None => tracing::info!("wake channel closed"),
                }
                break;
            }
            Some(Ready::Message { id, result }) => {
                let Some(connection) = table.get_mut(&id) else {
                    continue;
                };
                on_message(connection, result, &domain, &events, &mut report);
                tracker.refresh(id, now);
            }
        }
    }

    // ── Drain ───────────────────────────────────────────────────────
    set_state(&state, LoopState::Draining);

    let discarded = wake.drain();
    wake.close();
    tracing::debug!(discarded, "wake handle closed");

    for connection in table.values_mut() {
        match connection.close() {
            Ok(()) => report.connections_closed += 1,
            Err(e) => {
                tracing::warn!(client = %connection.basic_info(), error = %e, "close fail")
            }
        }
    }

    tracing::info!(closed = report.connections_closed, "subscriber loop terminated");
    set_state(&state, LoopState::Terminated);
    report
}

fn on_message<C: SubscriberClient>(
    connection: &mut PeerConnection<C>,
    result: Result<Multipart, BeaconTransportError>,
    domain: &str,
    events: &mpsc::Sender<SubscriberEvent>,
    report: &mut LoopReport,
) {
    let id = connection.id();
    let peer = *connection.remote_key();

    let message = match result {
        Ok(message) => message,
        Err(e) => {
            report.receive_errors += 1;
            tracing::error!(client = %connection.basic_info(), error = %e, "receive error");
            emit(
                events,
                SubscriberEvent::ReceiveFailed {
                    id,
                    peer,
                    error: e.to_string(),
                },
            );
            return;
        }
    };

    report.messages += 1;
    connection.mark_received();

    let outcome = match message.split_envelope() {
        Some((envelope, frames)) => {
            if envelope.as_ref() != domain.as_bytes() {
                tracing::debug!(
                    client = %connection.basic_info(),
                    envelope = %String::from_utf8_lossy(&envelope),
                    "envelope differs from local domain"
                );
            }
            dispatch(&connection.basic_info(), &frames)
        }
        None => {
            tracing::warn!(client = %connection.basic_info(), "receive message without envelope");
            Dispatch::Empty
        }
    };

    emit(events, SubscriberEvent::Received { id, peer, outcome });
}

fn sweep<C: SubscriberClient>(
    tracker: &mut ExpiryTracker,
    table: &mut BTreeMap<ConnectionId, PeerConnection<C>>,
    events: &mpsc::Sender<SubscriberEvent>,
    report: &mut LoopReport,
    now: Instant,
) {
    tracing::warn!(
        next_check = ?tracker.check_at(),
        tracked = tracker.len(),
        "timeout exceed"
    );
    report.sweeps += 1;

    let outcome = tracker.sweep(now, |id| {
        let Some(connection) = table.get_mut(&id) else {
            tracing::error!(connection = %id, "cannot find client for expired entry");
            return ExpiredAction::Gone;
        };

        tracing::error!(client = %connection.basic_info(), "socket expired");
        let peer = *connection.remote_key();
        emit(events, SubscriberEvent::Expired { id, peer });

        match connection.revive() {
            Revival::Reconnected => {
                tracing::info!(client = %connection.basic_info(), "reconnect to remote");
                emit(
                    events,
                    SubscriberEvent::Reconnected {
                        id,
                        peer,
                        state: connection.state(),
                    },
                );
                ExpiredAction::Reconnected
            }
            Revival::NotConnected => {
                tracing::warn!(client = %connection.basic_info(), "client not connected, retry at next check");
                ExpiredAction::Retry
            }
            Revival::Failed(e) => {
                tracing::error!(client = %connection.basic_info(), error = %e, "reconnect with error");
                emit(
                    events,
                    SubscriberEvent::ReconnectFailed {
                        id,
                        peer,
                        state: connection.state(),
                        error: e.to_string(),
                    },
                );
                ExpiredAction::Retry
            }
        }
    });

    report.reconnects += outcome.reconnected.len() as u64;
    report.retries += outcome.retrying.len() as u64;
    report.dropped += outcome.dropped.len() as u64;
    for id in outcome.dropped {
        emit(events, SubscriberEvent::Dropped { id });
    }

    tracing::info!(next_check = ?tracker.check_at(), "finish timeout processing");
}

fn set_state(state: &watch::Sender<LoopState>, next: LoopState) {
    tracing::debug!(state = ?next, "subscriber loop state");
    state.send_replace(next);
}

fn emit(events: &mpsc::Sender<SubscriberEvent>, event: SubscriberEvent) {
    let _ = events.try_send(event);
}
