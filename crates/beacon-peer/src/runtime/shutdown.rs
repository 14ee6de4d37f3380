/// Shutdown coordinator.
///
/// A one-shot request travels to a small task that turns it into a "stop"
/// on the wake pair, interrupting the event loop's blocked poll. Dropping
/// the request side counts as a request.
use beacon_transport::SignalPush;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Message pushed onto the wake pair.
pub(crate) const STOP: &[u8] = b"stop";

pub(crate) struct ShutdownSignal {
    request: Option<oneshot::Sender<()>>,
    coordinator: Option<JoinHandle<()>>,
}

impl ShutdownSignal {
    pub(crate) fn spawn(runtime: &Handle, push: SignalPush) -> Self {
        let (tx, rx) = oneshot::channel();
        let coordinator = runtime.spawn(coordinate(rx, push));
        Self {
            request: Some(tx),
            coordinator: Some(coordinator),
        }
    }

    /// Send the request. Only the first call does anything.
    pub(crate) fn request(&mut self) -> bool {
        match self.request.take() {
            Some(tx) => {
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    /// Wait for the coordinator task to exit.
    pub(crate) async fn finished(&mut self) {
        if let Some(coordinator) = self.coordinator.take() {
            if let Err(e) = coordinator.await {
                tracing::warn!(error = %e, "shutdown coordinator failed");
            }
        }
    }
}

async fn coordinate(request: oneshot::Receiver<()>, push: SignalPush) {
    match request.await {
        Ok(()) => tracing::info!("shutdown requested"),
        Err(_) => tracing::info!("subscriber runtime dropped, stopping"),
    }

    if let Err(e) = push.send(STOP) {
        // Loop already gone.
        tracing::debug!(error = %e, "stop signal not delivered");
    }
    push.close();
}
