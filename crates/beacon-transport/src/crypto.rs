/// Session encryption for beacon connections.
///
/// Both sides derive two directional XChaCha20-Poly1305 keys with
/// HKDF-SHA256 from the static-static and ephemeral-ephemeral X25519
/// shared secrets. The network domain tag is the HKDF salt, so peers on
/// different networks never agree on a key.
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use sha2::Sha256;

use crate::BeaconTransportError;

const INFO_TO_CLIENT: &[u8] = b"beacon-transport/server-to-client/v1";
const INFO_TO_SERVER: &[u8] = b"beacon-transport/client-to-server/v1";

/// Random extended nonce prepended to every sealed frame.
pub(crate) const NONCE_LENGTH: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Client,
    Server,
}

/// Directional ciphers for one established session.
pub(crate) struct SessionKeys {
    pub inbound: SessionCipher,
    pub outbound: SessionCipher,
}

pub(crate) fn derive_session(
    role: Role,
    domain: &[u8],
    static_shared: &[u8; 32],
    ephemeral_shared: &[u8; 32],
) -> SessionKeys {
    let mut ikm = [0u8; 64];
    ikm[..32].copy_from_slice(static_shared);
    ikm[32..].copy_from_slice(ephemeral_shared);

    let hkdf = Hkdf::<Sha256>::new(Some(domain), &ikm);
    let mut to_client = [0u8; 32];
    let mut to_server = [0u8; 32];
    hkdf.expand(INFO_TO_CLIENT, &mut to_client)
        .expect("HKDF-SHA256 expand to 32 bytes always succeeds");
    hkdf.expand(INFO_TO_SERVER, &mut to_server)
        .expect("HKDF-SHA256 expand to 32 bytes always succeeds");

    let (inbound, outbound) = match role {
        Role::Client => (to_client, to_server),
        Role::Server => (to_server, to_client),
    };
    SessionKeys {
        inbound: SessionCipher::new(inbound),
        outbound: SessionCipher::new(outbound),
    }
}

pub(crate) struct SessionCipher {
    cipher: XChaCha20Poly1305,
}

impl SessionCipher {
    fn new(key: [u8; 32]) -> Self {
        Self {
            cipher: XChaCha20Poly1305::new(&key.into()),
        }
    }

    /// Encrypt into `nonce ‖ ciphertext`.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, BeaconTransportError> {
        use chacha20poly1305::aead::rand_core::{OsRng, RngCore};

        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from(nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| BeaconTransportError::Crypto(format!("encryption failed: {e}")))?;

        let mut sealed = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, BeaconTransportError> {
        if sealed.len() < NONCE_LENGTH {
            return Err(BeaconTransportError::Crypto("sealed frame shorter than nonce".into()));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LENGTH);
        self.cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| BeaconTransportError::Crypto("decryption failed: authentication error".into()))
    }
}
