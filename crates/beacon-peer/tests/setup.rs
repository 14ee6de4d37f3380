//! Integration tests: runtime setup and the all-or-nothing cleanup path.
mod common;

use beacon_peer::{Chain, ConnectionId, LoopState, PeerError, SubscriberConfig, SubscriberRuntime};
use beacon_transport::{KeyPair, PublicKey};
use common::{descriptors, MockTransport};

fn config() -> SubscriberConfig {
    SubscriberConfig::new(Chain::Testing)
}

/// N valid descriptors give N connected clients, in order, on the chain's domain.
#[tokio::test(start_paused = true)]
async fn setup_connects_every_peer() {
    common::init_tracing();
    let transport = MockTransport::new();
    let keys = KeyPair::generate();
    let peers = descriptors(3);

    let runtime = SubscriberRuntime::setup(&transport, &keys, &peers, config()).unwrap();
    assert_eq!(runtime.local_key(), keys.public());
    assert_eq!(runtime.peers().len(), 3);
    assert_eq!(transport.client_count(), 3);

    for (n, (summary, record)) in runtime.peers().iter().zip(transport.records()).enumerate() {
        let expected: PublicKey = peers[n].public_key.parse().unwrap();
        assert_eq!(summary.id, ConnectionId::new(n));
        assert_eq!(summary.public_key, expected);
        assert_eq!(record.server_key, Some(expected));
        assert_eq!(record.address.unwrap().to_string(), peers[n].subscribe);
        assert_eq!(record.domain.as_deref(), Some("testing"));
        assert!(record.connected);
        assert_eq!(record.close_calls, 0);
    }

    let mut state = runtime.state_watch();
    state.wait_for(|s| *s == LoopState::Running).await.unwrap();
    runtime.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn zero_peers_is_rejected() {
    let transport = MockTransport::new();
    let result = SubscriberRuntime::setup(&transport, &KeyPair::generate(), &[], config());
    assert!(matches!(result, Err(PeerError::NoConnectionsAvailable)));
    assert_eq!(transport.client_count(), 0);
}

/// A self descriptor after two good ones closes both earlier clients once.
#[tokio::test(start_paused = true)]
async fn self_connection_closes_earlier_clients() {
    let transport = MockTransport::new();
    let keys = KeyPair::generate();
    let mut peers = descriptors(3);
    peers[2].public_key = keys.public().to_hex();

    let result = SubscriberRuntime::setup(&transport, &keys, &peers, config());
    match result {
        Err(PeerError::SelfConnectionForbidden { public_key }) => {
            assert_eq!(public_key, keys.public().to_hex())
        }
        other => panic!("expected SelfConnectionForbidden, got {other:?}"),
    }

    assert_eq!(transport.client_count(), 2);
    for record in transport.records() {
        assert_eq!(record.close_calls, 1);
    }
}

/// A failed connect closes the failing client too.
#[tokio::test(start_paused = true)]
async fn connect_failure_closes_all_clients() {
    let transport = MockTransport::new();
    transport.fail_connect_at(1);

    let result = SubscriberRuntime::setup(&transport, &KeyPair::generate(), &descriptors(3), config());
    assert!(matches!(result, Err(PeerError::Transport(_))));

    assert_eq!(transport.client_count(), 2);
    for record in transport.records() {
        assert_eq!(record.close_calls, 1);
    }
}

#[tokio::test(start_paused = true)]
async fn client_creation_failure_closes_earlier_clients() {
    let transport = MockTransport::new();
    transport.fail_new_client_at(2);

    let result = SubscriberRuntime::setup(&transport, &KeyPair::generate(), &descriptors(3), config());
    assert!(matches!(result, Err(PeerError::Transport(_))));

    assert_eq!(transport.client_count(), 2);
    for record in transport.records() {
        assert_eq!(record.close_calls, 1);
    }
}

#[tokio::test(start_paused = true)]
async fn bad_descriptor_closes_earlier_clients() {
    let transport = MockTransport::new();
    let mut peers = descriptors(2);
    peers[1].subscribe = "not an address".into();

    let result = SubscriberRuntime::setup(&transport, &KeyPair::generate(), &peers, config());
    assert!(matches!(result, Err(PeerError::InvalidAddress { .. })));
    assert_eq!(transport.client_count(), 1);
    assert_eq!(transport.record(0).close_calls, 1);

    let transport = MockTransport::new();
    let mut peers = descriptors(2);
    peers[1].public_key = "zz".into();

    let result = SubscriberRuntime::setup(&transport, &KeyPair::generate(), &peers, config());
    assert!(matches!(result, Err(PeerError::InvalidPublicKey { .. })));
    assert_eq!(transport.client_count(), 1);
    assert_eq!(transport.record(0).close_calls, 1);
}

#[test]
fn setup_needs_a_tokio_runtime() {
    let transport = MockTransport::new();
    let result = SubscriberRuntime::setup(&transport, &KeyPair::generate(), &descriptors(1), config());
    assert!(matches!(result, Err(PeerError::Runtime(_))));
    assert_eq!(transport.client_count(), 0);
}

/// Two runtimes in one process share nothing.
#[tokio::test(start_paused = true)]
async fn runtimes_are_independent() {
    let first_transport = MockTransport::new();
    let second_transport = MockTransport::new();

    let first =
        SubscriberRuntime::setup(&first_transport, &KeyPair::generate(), &descriptors(1), config())
            .unwrap();
    let second =
        SubscriberRuntime::setup(&second_transport, &KeyPair::generate(), &descriptors(2), config())
            .unwrap();

    let mut state = second.state_watch();
    state.wait_for(|s| *s == LoopState::Running).await.unwrap();

    let report = first.shutdown().await.unwrap();
    assert_eq!(report.connections_closed, 1);
    assert_eq!(second.state(), LoopState::Running);
    assert_eq!(second_transport.record(0).close_calls, 0);

    let report = second.shutdown().await.unwrap();
    assert_eq!(report.connections_closed, 2);
}
