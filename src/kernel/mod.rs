//! Kernel - the message-routing context shared by every module.
//!
//! The Kernel owns all shared mutable state of the bus:
//!   - one mailbox per active module (bounded FIFO)
//!   - group membership (group name -> member modules)
//!   - pending synchronous calls (request id -> waiting caller)
//!   - the process-wide cancellation token
//!
//! Patterns supported:
//!   - **Send/Receive**: asynchronous delivery to one module's mailbox
//!   - **SendSync/SendResp**: request/response correlated by parent id, with timeout
//!   - **SendToGroup**: fire-and-forget fan-out to all group members
//!   - **SendToGroupSync**: fan-out where every member must respond in time
//!
//! Modules hold an `Arc<Kernel>` and only ever see these operations.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::message::Message;
use crate::types::{Error, KernelConfig, Result};

mod mailbox;
mod pending;

use mailbox::Mailbox;
use pending::PendingCalls;

/// Statistics about kernel traffic.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelStats {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub sync_calls: u64,
    pub sync_timeouts: u64,
    pub responses_delivered: u64,
    pub responses_dropped: u64,
    pub group_broadcasts: u64,
    pub active_mailboxes: usize,
    pub pending_calls: usize,
}

/// In-process message kernel.
#[derive(Debug)]
pub struct Kernel {
    config: KernelConfig,

    /// Mailboxes: module name -> queue
    mailboxes: RwLock<HashMap<String, Mailbox>>,

    /// Groups: group name -> member modules (ordered for stable fan-out)
    groups: RwLock<BTreeMap<String, BTreeSet<String>>>,

    pending: PendingCalls,

    cancel: CancellationToken,

    stats: RwLock<KernelStats>,
}

impl Kernel {
    pub fn new(mut config: KernelConfig) -> Self {
        if config.mailbox_capacity == 0 {
            tracing::warn!("Mailbox capacity 0 is not usable, falling back to 1");
            config.mailbox_capacity = 1;
        }
        Self {
            config,
            mailboxes: RwLock::new(HashMap::new()),
            groups: RwLock::new(BTreeMap::new()),
            pending: PendingCalls::default(),
            cancel: CancellationToken::new(),
            stats: RwLock::new(KernelStats::default()),
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Timeout modules use when they have no better value.
    pub fn default_sync_timeout(&self) -> Duration {
        self.config.default_sync_timeout
    }

    // =========================================================================
    // Module Management
    // =========================================================================

    /// Create a mailbox for `module`. No-op if it already has one.
    pub async fn add_module(&self, module: &str) {
        let mut mailboxes = self.mailboxes.write().await;
        if mailboxes.contains_key(module) {
            tracing::debug!("Module {} already has a mailbox", module);
            return;
        }
        mailboxes.insert(
            module.to_string(),
            Mailbox::new(self.config.mailbox_capacity, &self.cancel),
        );
        tracing::debug!("Added mailbox for module {}", module);
    }

    /// Add `module` to `group`. The module must have a mailbox.
    pub async fn add_module_group(&self, module: &str, group: &str) -> Result<()> {
        // hold the mailbox lock so a concurrent cleanup cannot slip in between
        let mailboxes = self.mailboxes.read().await;
        if !mailboxes.contains_key(module) {
            return Err(Error::module_not_found(module));
        }

        let mut groups = self.groups.write().await;
        groups
            .entry(group.to_string())
            .or_default()
            .insert(module.to_string());

        tracing::debug!("Module {} joined group {}", module, group);
        Ok(())
    }

    /// Remove `module`: its mailbox, its group memberships, and any sync call
    /// sent to or from it. Idempotent.
    pub async fn cleanup(&self, module: &str) {
        let mut mailboxes = self.mailboxes.write().await;
        if let Some(mailbox) = mailboxes.remove(module) {
            mailbox.close();
        }

        let mut groups = self.groups.write().await;
        groups.retain(|_, members| {
            members.remove(module);
            !members.is_empty()
        });
        drop(groups);
        drop(mailboxes);

        let cancelled = self.pending.cancel_involving(module);
        tracing::debug!(
            "Cleaned up module {} (cancelled {} pending sync calls)",
            module,
            cancelled
        );
    }

    pub async fn has_module(&self, module: &str) -> bool {
        self.mailboxes.read().await.contains_key(module)
    }

    /// Names of modules with an active mailbox, sorted.
    pub async fn modules(&self) -> Vec<String> {
        let mut names: Vec<String> = self.mailboxes.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Current members of `group`, sorted. Empty for unknown groups.
    pub async fn group_members(&self, group: &str) -> Vec<String> {
        self.groups
            .read()
            .await
            .get(group)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Messages queued for `module`.
    pub async fn mailbox_len(&self, module: &str) -> Result<usize> {
        Ok(self.mailbox(module).await?.len())
    }

    async fn mailbox(&self, module: &str) -> Result<Mailbox> {
        self.mailboxes
            .read()
            .await
            .get(module)
            .cloned()
            .ok_or_else(|| Error::module_not_found(module))
    }

    // =========================================================================
    // Asynchronous Delivery
    // =========================================================================

    /// Enqueue `message` for `module`.
    ///
    /// Returns immediately while the mailbox has room; otherwise waits for
    /// space or for shutdown.
    pub async fn send(&self, module: &str, message: Message) -> Result<()> {
        let mailbox = self.mailbox(module).await?;
        let id = message.id().clone();
        mailbox.push(module, message).await?;

        self.stats.write().await.messages_sent += 1;
        tracing::debug!("Sent message {} to {}", id, module);
        Ok(())
    }

    /// Wait for the oldest message in `module`'s mailbox.
    pub async fn receive(&self, module: &str) -> Result<Message> {
        if self.cancel.is_cancelled() {
            return Err(self.shutdown_error());
        }
        let mailbox = self.mailbox(module).await?;
        let message = mailbox.pop(module).await?;

        self.stats.write().await.messages_received += 1;
        tracing::debug!("Module {} received message {}", module, message.id());
        Ok(message)
    }

    // =========================================================================
    // Synchronous Calls
    // =========================================================================

    /// Send `message` to `module` and wait for the correlated response.
    ///
    /// The response is whatever is passed to [`send_resp`](Self::send_resp)
    /// with `parent_id == message.id()`. Fails with `Timeout` when `timeout`
    /// elapses first and with `Cancelled` on shutdown or cleanup.
    pub async fn send_sync(
        &self,
        module: &str,
        message: Message,
        timeout: Duration,
    ) -> Result<Message> {
        self.send_sync_until(module, message, Instant::now() + timeout)
            .await
    }

    async fn send_sync_until(
        &self,
        module: &str,
        message: Message,
        deadline: Instant,
    ) -> Result<Message> {
        if self.cancel.is_cancelled() {
            return Err(self.shutdown_error());
        }

        let message = message.into_sync();
        let id = message.id().clone();
        let mut call = self.pending.register(id.clone(), module, message.source())?;
        self.stats.write().await.sync_calls += 1;

        // the deadline covers waiting for mailbox space too; on any failure
        // the guard drops and withdraws the call
        let sent = tokio::time::timeout_at(deadline, self.send(module, message)).await;
        let Ok(sent) = sent else {
            self.stats.write().await.sync_timeouts += 1;
            tracing::debug!(
                "Sync call {} to {} timed out waiting for mailbox space",
                id,
                module
            );
            return Err(Error::timeout(format!(
                "sync call {} to module {} could not be delivered in time",
                id, module
            )));
        };
        sent?;

        let expired = tokio::select! {
            biased;
            outcome = call.outcome() => return outcome,
            _ = self.cancel.cancelled() => self.shutdown_error(),
            _ = tokio::time::sleep_until(deadline) => Error::timeout(format!(
                "sync call {} to module {} got no response in time",
                id, module
            )),
        };

        if call.claim() {
            if expired.is_timeout() {
                self.stats.write().await.sync_timeouts += 1;
            }
            tracing::debug!("Sync call {} to {} ended: {}", id, module, expired);
            return Err(expired);
        }

        // a response or cleanup claimed the call first; its outcome is in flight
        call.outcome().await
    }

    /// Deliver a response to the waiting [`send_sync`](Self::send_sync) caller.
    ///
    /// Responses nobody waits for (timed out, cancelled, unknown parent) are
    /// dropped silently.
    pub async fn send_resp(&self, response: Message) {
        let Some(parent) = response.parent_id().cloned() else {
            tracing::debug!("Dropping response {} without parent id", response.id());
            self.stats.write().await.responses_dropped += 1;
            return;
        };

        if self.pending.resolve(&parent, response) {
            self.stats.write().await.responses_delivered += 1;
            tracing::debug!("Delivered response to sync call {}", parent);
        } else {
            self.stats.write().await.responses_dropped += 1;
            tracing::debug!("No pending sync call {}, response dropped", parent);
        }
    }

    /// Number of sync calls currently waiting for a response.
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    // =========================================================================
    // Group Broadcast
    // =========================================================================

    /// Deliver a fresh-id copy of `message` to every current member of `group`.
    ///
    /// A member that cannot be reached is skipped. Returns the number of
    /// members the message was delivered to.
    pub async fn send_to_group(&self, group: &str, message: Message) -> Result<usize> {
        let members = self.group_members(group).await;

        let mut delivered = 0;
        for member in &members {
            match self.send(member, message.clone_with_new_id()).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!("Skipping group {} member {}: {}", group, member, e);
                }
            }
        }

        self.stats.write().await.group_broadcasts += 1;
        tracing::debug!(
            "Broadcast message {} to group {} ({}/{} members)",
            message.id(),
            group,
            delivered,
            members.len()
        );
        Ok(delivered)
    }

    /// Synchronous call to every current member of `group` under one deadline.
    ///
    /// Succeeds with all responses, ordered by member name, only if every
    /// member answers in time. The first failure is returned and the other
    /// waits are abandoned.
    pub async fn send_to_group_sync(
        &self,
        group: &str,
        message: Message,
        timeout: Duration,
    ) -> Result<Vec<Message>> {
        if self.cancel.is_cancelled() {
            return Err(self.shutdown_error());
        }
        let members = self.group_members(group).await;
        let deadline = Instant::now() + timeout;

        let calls = members
            .iter()
            .map(|member| self.send_sync_until(member, message.clone_with_new_id(), deadline));
        let responses = futures::future::try_join_all(calls).await.map_err(|e| {
            tracing::debug!("Group sync call to {} failed: {}", group, e);
            e
        })?;

        self.stats.write().await.group_broadcasts += 1;
        Ok(responses)
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Fire the process-wide cancellation. Irreversible.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!("Kernel context cancelled");
        }
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the kernel is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Child token for module-owned loops; fires with the kernel's.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    fn shutdown_error(&self) -> Error {
        Error::cancelled("kernel context cancelled")
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    pub async fn get_stats(&self) -> KernelStats {
        let mut stats = self.stats.read().await.clone();
        stats.active_mailboxes = self.mailboxes.read().await.len();
        stats.pending_calls = self.pending.len();
        stats
    }

    /// Reset traffic counters.
    pub async fn reset_stats(&self) {
        *self.stats.write().await = KernelStats::default();
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}

// =============================================================================
// Tests
// =============================================================================
