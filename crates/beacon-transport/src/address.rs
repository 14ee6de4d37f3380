use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::BeaconTransportError;

/// A resolved `ip:port` peer address.
///
/// Accepts `127.0.0.1:2135` and `[::1]:2135`. Host names are not resolved;
/// peering configuration always names literal addresses.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerAddress(SocketAddr);

impl PeerAddress {
    pub fn socket_addr(&self) -> SocketAddr {
        self.0
    }
}

impl From<SocketAddr> for PeerAddress {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl FromStr for PeerAddress {
    type Err = BeaconTransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let addr: SocketAddr = s
            .trim()
            .parse()
            .map_err(|_| BeaconTransportError::InvalidAddress(s.to_string()))?;
        if addr.port() == 0 {
            return Err(BeaconTransportError::InvalidAddress(format!(
                "{s}: port must be non-zero"
            )));
        }
        Ok(Self(addr))
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerAddress({})", self.0)
    }
}
