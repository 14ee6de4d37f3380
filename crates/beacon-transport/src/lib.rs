//! beacon transport layer.
//!
//! Authenticated, encrypted publish/subscribe over TCP, exposed to the
//! subscriber core as a small capability contract:
//!
//! - [`Transport`] creates clients bound to a local identity.
//! - [`SubscriberClient`] connects, reconnects, closes, and is polled for
//!   inbound multipart messages.
//! - [`signal_pair`] builds the wake pair used to interrupt a blocked poll.
//!
//! [`CurveTransport`] / [`CurveClient`] implement the contract with an
//! X25519 handshake and XChaCha20-Poly1305 frames; [`CurvePublisher`] is
//! the matching server side.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use beacon_transport::{CurveConfig, CurveTransport, KeyPair, SubscriberClient, Transport};
//!
//! # async fn example() -> Result<(), beacon_transport::BeaconTransportError> {
//! let keys = KeyPair::generate();
//! let transport = CurveTransport::new(CurveConfig::new());
//!
//! let server_key = "d9d0ec8a1e5a05b3fb4bd8c35b8c1ff3df9af3b9e4e3a17eb3b5a0c4b4e8e27f".parse()?;
//! let mut client = transport.new_client(&keys)?;
//! client.connect(&"127.0.0.1:2135".parse()?, &server_key, "testing")?;
//!
//! let message = std::future::poll_fn(|cx| client.poll_recv(cx)).await?;
//! println!("{} frames from {}", message.len(), client.basic_info());
//! # Ok(())
//! # }
//! ```

mod address;
mod client;
mod config;
mod crypto;
mod error;
mod keys;
mod multipart;
mod protocol;
mod publisher;
mod signal;

pub use address::PeerAddress;
pub use client::{CurveClient, CurveTransport, SubscriberClient, Transport};
pub use config::CurveConfig;
pub use error::BeaconTransportError;
pub use keys::{read_private_key, read_public_key, KeyPair, PublicKey, SecretKey, KEY_LENGTH};
pub use multipart::Multipart;
pub use publisher::CurvePublisher;
pub use signal::{signal_pair, SignalPull, SignalPush};

/// Protocol magic sent first by every client.
pub const BEACON_MAGIC: &[u8; 4] = b"BCN1";
