use tokio::signal;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::{Receiver, Sender};

/// Broadcasts a single shutdown request to every listener.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Sender<()>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: tokio::sync::broadcast::channel(1).0,
        }
    }

    pub fn shutdown(&self) {
        if let Err(e) = self.sender.send(()) {
            // Nobody is listening any more
            log::debug!("Failed to send shutdown signal: {e:?}");
        }
    }

    pub fn new_listener(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }
}

#[derive(Debug)]
pub struct ShutdownListener {
    receiver: Receiver<()>,
}

impl ShutdownListener {
    /// Point in time check for a shutdown request.
    pub fn should_shutdown(&mut self) -> bool {
        match self.receiver.try_recv() {
            Ok(()) | Err(TryRecvError::Closed) => true,
            Err(TryRecvError::Empty) | Err(TryRecvError::Lagged(_)) => false,
        }
    }

    /// Wait for a shutdown request. Cancel safe, so it can be raced against other work.
    pub async fn wait_for_shutdown(&mut self) {
        if let Err(e) = self.receiver.recv().await {
            log::trace!("Shutdown channel ended: {e}");
        }
    }
}

/// Turn Ctrl-C into a shutdown request. Must be called from within a tokio runtime.
pub fn start_shutdown_listener() -> ShutdownHandle {
    let handle = ShutdownHandle::default();

    let listener_handle = handle.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                println!("Received shutdown signal, stopping the run...");
                listener_handle.shutdown();
            }
            Err(e) => log::error!("Failed to listen for Ctrl-C: {e}"),
        }
    });

    handle
}
