use std::path::PathBuf;

use crate::PeerAddress;

/// Errors returned by the beacon transport layer.
#[derive(Debug, thiserror::Error)]
pub enum BeaconTransportError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("public key does not match private key")]
    KeyMismatch,

    #[error("failed to read key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("failed to bind publisher: {0}")]
    Bind(#[source] anyhow::Error),

    #[error("connection to {address} failed: {source}")]
    Connect {
        address: PeerAddress,
        #[source]
        source: anyhow::Error,
    },

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("receive failed: {0}")]
    Receive(#[source] anyhow::Error),

    #[error("send failed: {0}")]
    Send(#[source] anyhow::Error),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("no tokio runtime available: {0}")]
    Runtime(String),

    #[error("client is not connected")]
    NotConnected,

    #[error("client is closed")]
    Closed,

    #[error("remote closed the connection")]
    Disconnected,
}
