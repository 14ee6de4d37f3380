/// Wire protocol: length-prefixed frames and the session handshake.
///
/// ```text
/// client → server   MAGIC ‖ u8 domain_len ‖ domain ‖ client_static_pk ‖ client_ephemeral_pk
/// server → client   server_ephemeral_pk
/// server → client   sealed(READY)
/// server → client   sealed(multipart)...
/// ```
use chacha20poly1305::aead::rand_core::OsRng;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey};

use crate::crypto::{derive_session, Role, SessionKeys};
use crate::{BeaconTransportError, KeyPair, PublicKey, BEACON_MAGIC, KEY_LENGTH};

/// Key-confirmation token, the first sealed frame of every session.
const READY: &[u8] = b"READY";

/// Upper bound on handshake frames; they are tiny.
const MAX_HANDSHAKE_FRAME: usize = 1024;

/// Write a length-prefixed frame.
pub(crate) async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), BeaconTransportError> {
    let len = u32::try_from(data.len())
        .map_err(|_| BeaconTransportError::FrameTooLarge {
            size: data.len(),
            max: u32::MAX as usize,
        })?
        .to_be_bytes();
    writer
        .write_all(&len)
        .await
        .map_err(|e| BeaconTransportError::Send(e.into()))?;
    writer
        .write_all(data)
        .await
        .map_err(|e| BeaconTransportError::Send(e.into()))?;
    writer
        .flush()
        .await
        .map_err(|e| BeaconTransportError::Send(e.into()))
}

/// Read a length-prefixed frame of at most `max_size` bytes.
pub(crate) async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_size: usize,
) -> Result<Vec<u8>, BeaconTransportError> {
    let mut len_buf = [0u8; 4];
    read_exact(reader, &mut len_buf).await?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_size {
        return Err(BeaconTransportError::FrameTooLarge {
            size: len,
            max: max_size,
        });
    }

    let mut buf = vec![0u8; len];
    read_exact(reader, &mut buf).await?;
    Ok(buf)
}

async fn read_exact<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> Result<(), BeaconTransportError> {
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(BeaconTransportError::Disconnected)
        }
        Err(e) => Err(BeaconTransportError::Receive(e.into())),
    }
}

/// Client side: announce ourselves, agree on keys, verify the server.
///
/// A server holding a different static key, or serving a different domain,
/// cannot produce a READY frame we can open.
pub(crate) async fn client_handshake<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    keys: &KeyPair,
    server_key: &PublicKey,
    domain: &str,
) -> Result<SessionKeys, BeaconTransportError> {
    let domain_len = u8::try_from(domain.len())
        .map_err(|_| BeaconTransportError::Handshake(format!("domain tag too long: {domain}")))?;

    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = X25519PublicKey::from(&ephemeral);

    let mut hello = Vec::with_capacity(BEACON_MAGIC.len() + 1 + domain.len() + 2 * KEY_LENGTH);
    hello.extend_from_slice(BEACON_MAGIC);
    hello.push(domain_len);
    hello.extend_from_slice(domain.as_bytes());
    hello.extend_from_slice(keys.public().as_bytes());
    hello.extend_from_slice(ephemeral_public.as_bytes());
    write_frame(stream, &hello).await?;

    let reply = read_frame(stream, MAX_HANDSHAKE_FRAME).await?;
    let server_ephemeral = key_from_slice(&reply)?;

    let static_shared = keys.secret().diffie_hellman(server_key);
    let ephemeral_shared = ephemeral
        .diffie_hellman(&X25519PublicKey::from(*server_ephemeral.as_bytes()))
        .to_bytes();
    let session = derive_session(Role::Client, domain.as_bytes(), &static_shared, &ephemeral_shared);

    let ready = read_frame(stream, MAX_HANDSHAKE_FRAME).await?;
    match session.inbound.open(&ready) {
        Ok(token) if token == READY => Ok(session),
        _ => Err(BeaconTransportError::Handshake(
            "server failed key confirmation".into(),
        )),
    }
}

/// Server side: accept a client for `domain`, returning its static key.
pub(crate) async fn server_handshake<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    keys: &KeyPair,
    domain: &str,
) -> Result<(PublicKey, SessionKeys), BeaconTransportError> {
    let hello = read_frame(stream, MAX_HANDSHAKE_FRAME).await?;

    let rest = hello
        .strip_prefix(BEACON_MAGIC.as_slice())
        .ok_or_else(|| BeaconTransportError::Handshake("bad magic".into()))?;
    let (&domain_len, rest) = rest
        .split_first()
        .ok_or_else(|| BeaconTransportError::Handshake("missing domain".into()))?;
    let domain_len = domain_len as usize;
    if rest.len() != domain_len + 2 * KEY_LENGTH {
        return Err(BeaconTransportError::Handshake(format!(
            "hello has {} bytes after domain length, expected {}",
            rest.len(),
            domain_len + 2 * KEY_LENGTH
        )));
    }
    let (client_domain, keys_part) = rest.split_at(domain_len);
    if client_domain != domain.as_bytes() {
        return Err(BeaconTransportError::Handshake(format!(
            "domain mismatch: client {:?}, server {domain:?}",
            String::from_utf8_lossy(client_domain)
        )));
    }
    let client_static = key_from_slice(&keys_part[..KEY_LENGTH])?;
    let client_ephemeral = key_from_slice(&keys_part[KEY_LENGTH..])?;

    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = X25519PublicKey::from(&ephemeral);
    write_frame(stream, ephemeral_public.as_bytes()).await?;

    let static_shared = keys.secret().diffie_hellman(&client_static);
    let ephemeral_shared = ephemeral
        .diffie_hellman(&X25519PublicKey::from(*client_ephemeral.as_bytes()))
        .to_bytes();
    let session = derive_session(Role::Server, domain.as_bytes(), &static_shared, &ephemeral_shared);

    let ready = session.outbound.seal(READY)?;
    write_frame(stream, &ready).await?;

    Ok((client_static, session))
}

fn key_from_slice(bytes: &[u8]) -> Result<PublicKey, BeaconTransportError> {
    let key: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| {
        BeaconTransportError::Handshake(format!(
            "expected {KEY_LENGTH}-byte key, got {} bytes",
            bytes.len()
        ))
    })?;
    Ok(PublicKey::from_bytes(key))
}
