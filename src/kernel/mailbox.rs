//! Per-module mailbox: a bounded FIFO queue with a close signal.

use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::message::Message;
use crate::types::{Error, Result};

/// Mailbox handle. Clones share the same queue.
///
/// `closed` is a child of the kernel's cancellation token, so it fires on
/// process-wide shutdown as well as on cleanup of this one module.
#[derive(Debug, Clone)]
pub(crate) struct Mailbox {
    tx: mpsc::Sender<Message>,
    rx: Arc<Mutex<mpsc::Receiver<Message>>>,
    closed: CancellationToken,
}

impl Mailbox {
    pub(crate) fn new(capacity: usize, shutdown: &CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            closed: shutdown.child_token(),
        }
    }

    /// Enqueue at the tail. Waits for space when full.
    pub(crate) async fn push(&self, module: &str, message: Message) -> Result<()> {
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Closed(_)) => Err(Error::module_not_found(module)),
            Err(TrySendError::Full(message)) => {
                tracing::debug!("Mailbox {} full, waiting for space", module);
                tokio::select! {
                    biased;
                    _ = self.closed.cancelled() => Err(closed_error(module)),
                    sent = self.tx.send(message) => {
                        sent.map_err(|_| Error::module_not_found(module))
                    }
                }
            }
        }
    }

    /// Dequeue the oldest message, waiting until one is available.
    ///
    /// Concurrent receivers on the same mailbox take turns on the receiver
    /// lock, so each message is handed out exactly once and in order.
    pub(crate) async fn pop(&self, module: &str) -> Result<Message> {
        let mut rx = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(closed_error(module)),
            guard = self.rx.lock() => guard,
        };

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(closed_error(module)),
            message = rx.recv() => message.ok_or_else(|| closed_error(module)),
        }
    }

    pub(crate) fn close(&self) {
        self.closed.cancel();
    }

    /// Number of queued messages.
    pub(crate) fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

fn closed_error(module: &str) -> Error {
    Error::cancelled(format!("mailbox of module {} is closed", module))
}
