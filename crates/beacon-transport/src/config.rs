/// Configuration for [`CurveTransport`](crate::CurveTransport) clients and
/// [`CurvePublisher`](crate::CurvePublisher).
///
/// ```rust
/// use beacon_transport::CurveConfig;
///
/// let config = CurveConfig::new()
///     .max_frame_size(64 * 1024)
///     .recv_buffer(32);
/// ```
#[derive(Debug, Clone)]
pub struct CurveConfig {
    /// Maximum sealed frame size in bytes.
    pub(crate) max_frame_size: usize,
    /// Buffered inbound messages per client session.
    pub(crate) recv_buffer: usize,
    /// Buffered outbound messages per publisher subscriber.
    pub(crate) send_buffer: usize,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CurveConfig {
    pub fn new() -> Self {
        Self {
            max_frame_size: 1024 * 1024, // 1 MB
            recv_buffer: 256,
            send_buffer: 1024,
        }
    }

    /// Set the maximum sealed frame size (default: 1 MB).
    pub fn max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = bytes;
        self
    }

    /// Set the per-session inbound buffer (default: 256).
    pub fn recv_buffer(mut self, capacity: usize) -> Self {
        self.recv_buffer = capacity.max(1);
        self
    }

    /// Set the per-subscriber outbound buffer on a publisher (default: 1024).
    pub fn send_buffer(mut self, capacity: usize) -> Self {
        self.send_buffer = capacity.max(1);
        self
    }
}
