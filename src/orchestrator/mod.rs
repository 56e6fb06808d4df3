//! Orchestrator - module lifecycle.
//!
//! Startup: every enabled module gets a mailbox, joins its group, and is
//! spawned on its own task. Shutdown: the kernel is cancelled (unblocking
//! every receive and sync call), then each module is cleaned up. Module
//! tasks are not awaited unless `shutdown.module_join_timeout` is set;
//! shutdown is cooperative.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::kernel::Kernel;
use crate::module::ModuleRegistry;
use crate::types::{Config, Result, ShutdownConfig};

pub mod signal;

pub use signal::{wait_for_termination, TerminationSignal};

/// Owns the registry and the shared kernel for the lifetime of the process.
#[derive(Debug)]
pub struct Orchestrator {
    registry: ModuleRegistry,
    kernel: Arc<Kernel>,
    shutdown: ShutdownConfig,
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl Orchestrator {
    pub fn new(registry: ModuleRegistry, config: &Config) -> Self {
        Self {
            registry,
            kernel: Arc::new(Kernel::new(config.kernel.clone())),
            shutdown: config.shutdown.clone(),
            tasks: Vec::new(),
        }
    }

    pub fn kernel(&self) -> Arc<Kernel> {
        Arc::clone(&self.kernel)
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Register mailboxes and groups, then spawn every enabled module.
    pub async fn start_modules(&mut self) -> Result<()> {
        for (name, module) in self.registry.modules() {
            self.kernel.add_module(name).await;
            self.kernel.add_module_group(name, module.group()).await?;

            let module = Arc::clone(module);
            let kernel = Arc::clone(&self.kernel);
            let handle = tokio::spawn(async move { module.start(kernel).await });
            self.tasks.push((name.clone(), handle));

            tracing::info!("Starting module {}", name);
        }
        Ok(())
    }

    /// Wait for a termination signal, then shut down.
    pub async fn graceful_shutdown(&mut self) -> Result<()> {
        let signal = wait_for_termination().await?;
        tracing::info!("Got os signal {}", signal);
        self.shutdown().await;
        Ok(())
    }

    /// Cancel the kernel and clean up every module.
    pub async fn shutdown(&mut self) {
        self.kernel.cancel();
        for name in self.registry.modules().keys() {
            tracing::info!("Cleanup module {}", name);
            self.kernel.cleanup(name).await;
        }
        self.join_modules().await;
    }

    /// Start modules and block until a termination signal has been handled.
    pub async fn run(mut self) -> Result<()> {
        self.start_modules().await?;
        self.graceful_shutdown().await
    }

    /// Like [`run`](Self::run), with a caller-supplied shutdown trigger.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.start_modules().await?;
        shutdown.await;
        tracing::info!("Shutdown requested");
        self.shutdown().await;
        Ok(())
    }

    async fn join_modules(&mut self) {
        let tasks = std::mem::take(&mut self.tasks);
        let timeout = self.shutdown.module_join_timeout;
        if timeout.is_zero() {
            tracing::debug!("Leaving {} module tasks to finish on their own", tasks.len());
            return;
        }

        let joins = tasks.into_iter().map(|(name, handle)| async move {
            match handle.await {
                Ok(()) => tracing::debug!("Module {} stopped", name),
                Err(e) if e.is_panic() => tracing::error!("Module {} panicked: {}", name, e),
                Err(e) => tracing::warn!("Module {} task failed: {}", name, e),
            }
        });

        if tokio::time::timeout(timeout, futures::future::join_all(joins))
            .await
            .is_err()
        {
            tracing::warn!(
                "Module tasks still running after {:?}, continuing shutdown",
                timeout
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::module::Module;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Answers every request with "pong" until the kernel shuts down.
    #[derive(Debug, Default)]
    struct PongModule {
        stopped: AtomicBool,
    }

    #[async_trait]
    impl Module for PongModule {
        fn name(&self) -> &str {
            "pong"
        }

        fn group(&self) -> &str {
            "ping"
        }

        async fn start(&self, kernel: Arc<Kernel>) {
            while let Ok(req) = kernel.receive(self.name()).await {
                kernel.send_resp(Message::new_response(&req, "pong")).await;
            }
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Debug)]
    struct PanickingModule;

    #[async_trait]
    impl Module for PanickingModule {
        fn name(&self) -> &str {
            "faulty"
        }

        fn group(&self) -> &str {
            "faulty"
        }

        #[allow(clippy::panic)]
        async fn start(&self, _kernel: Arc<Kernel>) {
            panic!("module fault");
        }
    }

    #[derive(Debug)]
    struct DisabledModule;

    #[async_trait]
    impl Module for DisabledModule {
        fn name(&self) -> &str {
            "disabled"
        }

        fn group(&self) -> &str {
            "ping"
        }

        fn enable(&self) -> bool {
            false
        }

        async fn start(&self, _kernel: Arc<Kernel>) {}
    }

    fn config_with_join_timeout() -> Config {
        let mut config = Config::default();
        config.shutdown.module_join_timeout = Duration::from_secs(1);
        config
    }

    #[tokio::test]
    async fn test_start_modules_registers_mailboxes_and_groups() {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(PongModule::default()));
        registry.register(Arc::new(DisabledModule));

        let mut orchestrator = Orchestrator::new(registry, &Config::default());
        orchestrator.start_modules().await.unwrap();

        let kernel = orchestrator.kernel();
        assert_eq!(kernel.modules().await, vec!["pong".to_string()]);
        assert_eq!(kernel.group_members("ping").await, vec!["pong".to_string()]);

        let resp = kernel
            .send_sync("pong", Message::new(None), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(resp.content().as_text(), Some("pong"));

        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_modules_and_cleans_up() {
        let pong = Arc::new(PongModule::default());
        let mut registry = ModuleRegistry::new();
        registry.register(pong.clone());

        let mut orchestrator = Orchestrator::new(registry, &config_with_join_timeout());
        orchestrator.start_modules().await.unwrap();
        let kernel = orchestrator.kernel();

        orchestrator.shutdown().await;

        assert!(kernel.is_cancelled());
        assert!(kernel.modules().await.is_empty());
        assert!(kernel.group_members("ping").await.is_empty());
        assert!(pong.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_module_panic_is_contained() {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(PanickingModule));
        registry.register(Arc::new(PongModule::default()));

        let mut orchestrator = Orchestrator::new(registry, &config_with_join_timeout());
        orchestrator.start_modules().await.unwrap();
        let kernel = orchestrator.kernel();

        // the healthy module keeps serving after its neighbour died
        let resp = kernel
            .send_sync("pong", Message::new(None), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(resp.content().as_text(), Some("pong"));

        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn test_run_until_shuts_down_on_trigger() {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(PongModule::default()));
        let orchestrator = Orchestrator::new(registry, &Config::default());
        let kernel = orchestrator.kernel();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let run = tokio::spawn(orchestrator.run_until(async {
            let _ = rx.await;
        }));

        while !kernel.has_module("pong").await {
            tokio::task::yield_now().await;
        }
        tx.send(()).unwrap();
        run.await.unwrap().unwrap();

        assert!(kernel.is_cancelled());
        assert!(!kernel.has_module("pong").await);
    }
}
