//! Pending synchronous calls.
//!
//! One entry per in-flight `send_sync`, keyed by the request id. Whoever
//! removes the entry (response, timeout, cancellation, cleanup) owns the
//! outcome; everyone else lost the race.
//!
//! An id can have only one caller waiting on it at a time. Each entry carries
//! the sequence number of the call that registered it, and a guard only ever
//! withdraws its own entry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

use crate::message::Message;
use crate::types::{Error, MessageId, Result};

#[derive(Debug)]
struct PendingCall {
    seq: u64,
    target: String,
    source: String,
    tx: oneshot::Sender<Result<Message>>,
}

/// Pending-call table. The lock is never held across an await point, which
/// lets [`PendingGuard`] clean up from `Drop`.
#[derive(Debug, Clone, Default)]
pub(crate) struct PendingCalls {
    calls: Arc<Mutex<HashMap<MessageId, PendingCall>>>,
    next_seq: Arc<AtomicU64>,
}

impl PendingCalls {
    fn lock(&self) -> MutexGuard<'_, HashMap<MessageId, PendingCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a call for `id` sent from `source` to `target`.
    ///
    /// Fails if another call is already waiting on the same id.
    pub(crate) fn register(
        &self,
        id: MessageId,
        target: &str,
        source: &str,
    ) -> Result<PendingGuard> {
        let (tx, rx) = oneshot::channel();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        let mut calls = self.lock();
        if calls.contains_key(&id) {
            return Err(Error::validation(format!(
                "sync call {} is already waiting for a response",
                id
            )));
        }
        calls.insert(
            id.clone(),
            PendingCall {
                seq,
                target: target.to_string(),
                source: source.to_string(),
                tx,
            },
        );
        drop(calls);

        Ok(PendingGuard {
            id,
            seq,
            table: self.clone(),
            rx,
        })
    }

    /// Hand `response` to the call keyed by `parent`. False if nobody waits.
    pub(crate) fn resolve(&self, parent: &MessageId, response: Message) -> bool {
        let Some(call) = self.lock().remove(parent) else {
            return false;
        };
        // receiver may already be gone if the waiter was dropped
        let _ = call.tx.send(Ok(response));
        true
    }

    /// Cancel every call sent to or from `module`.
    pub(crate) fn cancel_involving(&self, module: &str) -> usize {
        let claimed: Vec<(MessageId, PendingCall)> = {
            let mut calls = self.lock();
            let ids: Vec<MessageId> = calls
                .iter()
                .filter(|(_, call)| call.target == module || call.source == module)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| calls.remove(&id).map(|call| (id, call)))
                .collect()
        };

        let count = claimed.len();
        for (id, call) in claimed {
            let _ = call.tx.send(Err(Error::cancelled(format!(
                "sync call {} cancelled: module {} cleaned up",
                id, module
            ))));
        }
        count
    }

    /// Remove the entry for `id` only if it still belongs to call `seq`.
    fn remove_own(&self, id: &MessageId, seq: u64) -> bool {
        let mut calls = self.lock();
        match calls.get(id) {
            Some(call) if call.seq == seq => calls.remove(id).is_some(),
            _ => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Waiting side of one pending call. Dropping it withdraws the call.
#[derive(Debug)]
pub(crate) struct PendingGuard {
    id: MessageId,
    seq: u64,
    table: PendingCalls,
    rx: oneshot::Receiver<Result<Message>>,
}

impl PendingGuard {
    /// Wait for whoever claimed the call to deliver its outcome.
    pub(crate) async fn outcome(&mut self) -> Result<Message> {
        match (&mut self.rx).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::cancelled(format!("sync call {} abandoned", self.id))),
        }
    }

    /// Try to claim the call for the waiter itself (timeout, shutdown).
    pub(crate) fn claim(&self) -> bool {
        self.table.remove_own(&self.id, self.seq)
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.table.remove_own(&self.id, self.seq);
    }
}
