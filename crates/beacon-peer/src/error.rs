/// Errors raised while setting up or stopping a subscriber runtime.
///
/// The steady-state event loop never returns errors; failures there are
/// logged and retried.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("zero connections are available")]
    NoConnectionsAvailable,

    #[error("connecting to self is forbidden: {public_key}")]
    SelfConnectionForbidden { public_key: String },

    #[error("invalid subscribe address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: beacon_transport::BeaconTransportError,
    },

    #[error("invalid public key {public_key:?}: {source}")]
    InvalidPublicKey {
        public_key: String,
        #[source]
        source: beacon_transport::BeaconTransportError,
    },

    #[error("transport error: {0}")]
    Transport(#[from] beacon_transport::BeaconTransportError),

    #[error("no tokio runtime available: {0}")]
    Runtime(String),

    #[error("event loop task failed: {0}")]
    EventLoop(#[from] tokio::task::JoinError),
}
