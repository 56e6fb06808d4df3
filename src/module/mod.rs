//! Modules - independently scheduled units that talk through the kernel.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::kernel::Kernel;

mod registry;

pub use registry::ModuleRegistry;

/// Capability every module exposes to the runtime.
///
/// `start` is invoked exactly once, on its own task, with the shared kernel.
/// It normally loops on [`Kernel::receive`] until that returns `Cancelled`.
#[async_trait]
pub trait Module: Send + Sync + fmt::Debug {
    /// Unique module name; also the name of its mailbox.
    fn name(&self) -> &str;

    /// Primary group the module joins at startup.
    fn group(&self) -> &str;

    /// Read once, at registration.
    fn enable(&self) -> bool {
        true
    }

    async fn start(&self, kernel: Arc<Kernel>);
}
