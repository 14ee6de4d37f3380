/// In-process signal pair used to wake a blocked poll.
///
/// The push side sends at most one pending signal; extra sends while one is
/// queued are absorbed. A pull side whose push half is gone reports that as
/// a signal too, so a poller is never left waiting on a dead pair.
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::BeaconTransportError;

/// Create a connected push/pull pair.
pub fn signal_pair() -> (SignalPush, SignalPull) {
    let (tx, rx) = mpsc::channel(1);
    (SignalPush { tx }, SignalPull { rx })
}

/// Sending half of a signal pair.
#[derive(Debug)]
pub struct SignalPush {
    tx: mpsc::Sender<Bytes>,
}

impl SignalPush {
    /// Queue a signal without waiting.
    pub fn send(&self, message: impl Into<Bytes>) -> Result<(), BeaconTransportError> {
        match self.tx.try_send(message.into()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(BeaconTransportError::Closed),
        }
    }

    /// Close the push half. A queued signal is still delivered.
    pub fn close(self) {
        drop(self);
    }
}

/// Receiving half of a signal pair; pollable alongside client handles.
#[derive(Debug)]
pub struct SignalPull {
    rx: mpsc::Receiver<Bytes>,
}

impl SignalPull {
    /// Ready with `Some(message)` for a signal, `None` once the push half is gone.
    pub fn poll_signal(&mut self, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        self.rx.poll_recv(cx)
    }

    /// Wait for the next signal.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Discard queued signals, returning how many were dropped.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        while self.rx.try_recv().is_ok() {
            drained += 1;
        }
        drained
    }

    /// Close the pull half; later sends fail with `Closed`.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_is_delivered() {
        let (push, mut pull) = signal_pair();
        push.send("stop").unwrap();
        assert_eq!(pull.recv().await.as_deref(), Some(&b"stop"[..]));
    }

    #[tokio::test]
    async fn extra_signals_are_absorbed() {
        let (push, mut pull) = signal_pair();
        push.send("stop").unwrap();
        push.send("stop").unwrap();
        assert!(pull.recv().await.is_some());
        assert_eq!(pull.drain(), 0);
    }

    #[tokio::test]
    async fn closed_push_still_delivers_then_ends() {
        let (push, mut pull) = signal_pair();
        push.send("stop").unwrap();
        push.close();
        assert!(pull.recv().await.is_some());
        assert!(pull.recv().await.is_none());
    }

    #[test]
    fn send_after_pull_closed_fails() {
        let (push, mut pull) = signal_pair();
        pull.close();
        assert!(matches!(push.send("stop"), Err(BeaconTransportError::Closed)));
    }
}
