//! beacon subscriber core.
//!
//! Keeps long-lived encrypted subscriptions to a static list of peers,
//! reconnects the ones that fall silent, and demultiplexes inbound gossip
//! by topic tag.
//!
//! - [`establish`] builds one connected client per [`PeerDescriptor`],
//!   closing everything it created if any step fails.
//! - [`ExpiryTracker`] keeps a liveness deadline per connection and decides
//!   when a reconnect is due.
//! - [`dispatch()`] routes a message by its topic tag.
//! - [`SubscriberRuntime`] ties them together: it owns the event loop task
//!   and its shutdown path.
//!
//! # Example
//!
//! ```rust,no_run
//! use beacon_peer::{Chain, PeerDescriptor, SubscriberConfig, SubscriberRuntime};
//! use beacon_transport::{CurveTransport, KeyPair};
//!
//! # async fn example() -> Result<(), beacon_peer::PeerError> {
//! let keys = KeyPair::generate();
//! let peers = vec![PeerDescriptor {
//!     public_key: "d9d0ec8a1e5a05b3fb4bd8c35b8c1ff3df9af3b9e4e3a17eb3b5a0c4b4e8e27f".into(),
//!     subscribe: "127.0.0.1:2135".into(),
//!     connect: "127.0.0.1:2136".into(),
//! }];
//!
//! let runtime = SubscriberRuntime::setup(
//!     &CurveTransport::default(),
//!     &keys,
//!     &peers,
//!     SubscriberConfig::new(Chain::Testing),
//! )?;
//!
//! tokio::signal::ctrl_c().await.ok();
//! let report = runtime.shutdown().await?;
//! println!("closed {} connections", report.connections_closed);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod establish;
pub mod expiry;
pub mod poller;
pub mod runtime;

pub use config::{Chain, PeerConfiguration, PeerDescriptor, SubscriberConfig};
pub use connection::{ConnectionId, ConnectionState, PeerConnection};
pub use dispatch::{dispatch, Dispatch, Topic};
pub use error::PeerError;
pub use establish::establish;
pub use expiry::{
    heartbeat_timeout, ExpiredAction, ExpiryTracker, SweepReport, HEARTBEAT_INTERVAL,
    HEARTBEAT_TIMEOUT, MAX_HEARTBEAT_INTERVAL,
};
pub use poller::{Poller, Ready};
pub use runtime::{LoopReport, LoopState, PeerSummary, SubscriberEvent, SubscriberRuntime};
