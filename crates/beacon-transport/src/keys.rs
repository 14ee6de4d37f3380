/// Curve25519 key material for beacon identities.
///
/// Keys are 32 raw bytes, shown and parsed as hex. Key files hold a single
/// tagged line, `PUBLIC:<hex>` or `PRIVATE:<hex>`; the tag is optional.
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chacha20poly1305::aead::rand_core::OsRng;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use crate::BeaconTransportError;

/// Length of every beacon key in bytes.
pub const KEY_LENGTH: usize = 32;

const PUBLIC_TAG: &str = "PUBLIC:";
const PRIVATE_TAG: &str = "PRIVATE:";

/// A node's public identity (X25519 public key).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; KEY_LENGTH]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    /// Decode from a hex string (64 characters).
    pub fn from_hex(s: &str) -> Result<Self, BeaconTransportError> {
        decode_key(s).map(Self)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "PublicKey({}...)", &hex[..12])
    }
}

impl FromStr for PublicKey {
    type Err = BeaconTransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// A node's private key. Never printed.
#[derive(Clone)]
pub struct SecretKey([u8; KEY_LENGTH]);

impl SecretKey {
    /// Generate a fresh random key from the OS RNG.
    pub fn generate() -> Self {
        Self(StaticSecret::random_from_rng(OsRng).to_bytes())
    }

    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, BeaconTransportError> {
        decode_key(s).map(Self)
    }

    /// The public key matching this secret.
    pub fn public_key(&self) -> PublicKey {
        let secret = StaticSecret::from(self.0);
        PublicKey(X25519PublicKey::from(&secret).to_bytes())
    }

    /// Static Diffie-Hellman with a remote public key.
    pub(crate) fn diffie_hellman(&self, remote: &PublicKey) -> [u8; 32] {
        let secret = StaticSecret::from(self.0);
        secret
            .diffie_hellman(&X25519PublicKey::from(remote.0))
            .to_bytes()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Local identity: private key plus its public key.
#[derive(Clone, Debug)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        Self::from_secret(SecretKey::generate())
    }

    pub fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Pair key material loaded separately, checking that it belongs together.
    pub fn new(secret: SecretKey, public: PublicKey) -> Result<Self, BeaconTransportError> {
        if secret.public_key() != public {
            return Err(BeaconTransportError::KeyMismatch);
        }
        Ok(Self { secret, public })
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }
}

/// Read a `PUBLIC:<hex>` key file.
pub fn read_public_key(path: impl AsRef<Path>) -> Result<PublicKey, BeaconTransportError> {
    let contents = read_key_file(path.as_ref())?;
    PublicKey::from_hex(strip_tag(&contents, PUBLIC_TAG))
}

/// Read a `PRIVATE:<hex>` key file.
pub fn read_private_key(path: impl AsRef<Path>) -> Result<SecretKey, BeaconTransportError> {
    let contents = read_key_file(path.as_ref())?;
    SecretKey::from_hex(strip_tag(&contents, PRIVATE_TAG))
}

fn read_key_file(path: &Path) -> Result<String, BeaconTransportError> {
    std::fs::read_to_string(path).map_err(|source| BeaconTransportError::KeyFile {
        path: path.to_path_buf(),
        source,
    })
}

fn strip_tag<'a>(contents: &'a str, tag: &str) -> &'a str {
    let trimmed = contents.trim();
    trimmed.strip_prefix(tag).unwrap_or(trimmed).trim()
}

fn decode_key(s: &str) -> Result<[u8; KEY_LENGTH], BeaconTransportError> {
    let bytes = hex::decode(s.trim())
        .map_err(|e| BeaconTransportError::InvalidKey(format!("{s:?}: {e}")))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        BeaconTransportError::InvalidKey(format!(
            "expected {KEY_LENGTH} bytes, got {}",
            bytes.len()
        ))
    })
}
