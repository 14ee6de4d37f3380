/// Peering configuration and subscriber runtime settings.
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::expiry::{heartbeat_timeout, HEARTBEAT_INTERVAL, MAX_HEARTBEAT_INTERVAL};

/// One static peer to subscribe to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerDescriptor {
    /// Remote public key, hex encoded.
    pub public_key: String,
    /// Address of the remote publisher.
    pub subscribe: String,
    /// Address of the remote RPC listener (informational).
    #[serde(default)]
    pub connect: String,
}

/// The `peering` section of a node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfiguration {
    /// Private key file.
    pub private_key: String,
    /// Public key file.
    pub public_key: String,
    /// Heartbeat interval in seconds; the timeout is twice this.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    /// Peers to subscribe to, in order.
    #[serde(default)]
    pub node: Vec<PeerDescriptor>,
}

fn default_heartbeat_interval_secs() -> u64 {
    HEARTBEAT_INTERVAL.as_secs()
}

/// Network the node runs on. Its name is the transport domain tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    #[default]
    Bitmark,
    Testing,
    Local,
}

impl Chain {
    pub fn name(self) -> &'static str {
        match self {
            Chain::Bitmark => "bitmark",
            Chain::Testing => "testing",
            Chain::Local => "local",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bitmark" => Ok(Chain::Bitmark),
            "testing" => Ok(Chain::Testing),
            "local" => Ok(Chain::Local),
            other => Err(format!("unknown chain: {other}")),
        }
    }
}

/// Settings for a [`SubscriberRuntime`](crate::SubscriberRuntime).
///
/// ```rust
/// use std::time::Duration;
/// use beacon_peer::{Chain, SubscriberConfig};
///
/// let config = SubscriberConfig::new(Chain::Testing)
///     .heartbeat_interval(Duration::from_secs(5));
/// assert_eq!(config.heartbeat_timeout(), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    pub(crate) domain: String,
    pub(crate) heartbeat_interval: Duration,
    pub(crate) event_buffer: usize,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self::new(Chain::default())
    }
}

impl SubscriberConfig {
    pub fn new(chain: Chain) -> Self {
        Self {
            domain: chain.name().to_string(),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            event_buffer: 256,
        }
    }

    /// Build from a `peering` section.
    pub fn from_peering(chain: Chain, peering: &PeerConfiguration) -> Self {
        Self::new(chain).heartbeat_interval(Duration::from_secs(peering.heartbeat_interval_secs))
    }

    /// Override the domain tag (defaults to the chain name).
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Set the heartbeat interval (default: 60 s). Zero is raised to 1 ms,
    /// anything above [`MAX_HEARTBEAT_INTERVAL`] is lowered to it.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        if interval > MAX_HEARTBEAT_INTERVAL {
            tracing::warn!(
                requested = ?interval,
                limit = ?MAX_HEARTBEAT_INTERVAL,
                "heartbeat interval clamped"
            );
        }
        self.heartbeat_interval = interval.clamp(Duration::from_millis(1), MAX_HEARTBEAT_INTERVAL);
        self
    }

    pub fn interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Set the observability event buffer (default: 256).
    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    pub fn domain_tag(&self) -> &str {
        &self.domain
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        heartbeat_timeout(self.heartbeat_interval)
    }
}
