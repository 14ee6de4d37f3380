use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::BeaconTransportError;

/// A multi-frame message, the unit of every publish and receive.
///
/// Encoded as `u16 count` followed by `u32 length ‖ bytes` per frame,
/// all big-endian.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Multipart(Vec<Bytes>);

impl Multipart {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, frame: impl Into<Bytes>) {
        self.0.push(frame.into());
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, frame: impl Into<Bytes>) -> Self {
        self.push(frame);
        self
    }

    pub fn frames(&self) -> &[Bytes] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_frames(self) -> Vec<Bytes> {
        self.0
    }

    /// Split off the leading envelope frame.
    ///
    /// Returns `None` for an empty message.
    pub fn split_envelope(self) -> Option<(Bytes, Vec<Bytes>)> {
        let mut frames = self.0.into_iter();
        let envelope = frames.next()?;
        Some((envelope, frames.collect()))
    }

    /// Prepend an envelope frame.
    pub fn wrap(self, envelope: impl Into<Bytes>) -> Self {
        let mut frames = Vec::with_capacity(self.0.len() + 1);
        frames.push(envelope.into());
        frames.extend(self.0);
        Self(frames)
    }

    pub fn encode(&self) -> Result<Bytes, BeaconTransportError> {
        let count = u16::try_from(self.0.len()).map_err(|_| {
            BeaconTransportError::Malformed(format!("too many frames: {}", self.0.len()))
        })?;
        let size = 2 + self.0.iter().map(|f| 4 + f.len()).sum::<usize>();
        let mut buf = BytesMut::with_capacity(size);
        buf.put_u16(count);
        for frame in &self.0 {
            let len = u32::try_from(frame.len()).map_err(|_| {
                BeaconTransportError::Malformed(format!("frame too long: {}", frame.len()))
            })?;
            buf.put_u32(len);
            buf.put_slice(frame);
        }
        Ok(buf.freeze())
    }

    pub fn decode(mut data: Bytes) -> Result<Self, BeaconTransportError> {
        if data.remaining() < 2 {
            return Err(BeaconTransportError::Malformed("missing frame count".into()));
        }
        let count = data.get_u16() as usize;
        let mut frames = Vec::with_capacity(count);
        for index in 0..count {
            if data.remaining() < 4 {
                return Err(BeaconTransportError::Malformed(format!(
                    "frame {index}: missing length"
                )));
            }
            let len = data.get_u32() as usize;
            if data.remaining() < len {
                return Err(BeaconTransportError::Malformed(format!(
                    "frame {index}: {len} bytes announced, {} available",
                    data.remaining()
                )));
            }
            frames.push(data.split_to(len));
        }
        if data.has_remaining() {
            return Err(BeaconTransportError::Malformed(format!(
                "{} trailing bytes",
                data.remaining()
            )));
        }
        Ok(Self(frames))
    }
}

impl<T: Into<Bytes>> FromIterator<T> for Multipart {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<Bytes>> for Multipart {
    fn from(frames: Vec<Bytes>) -> Self {
        Self(frames)
    }
}
