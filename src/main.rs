//! Beehive demo runtime - main entry point.
//!
//! Runs the orchestrator with two sample modules until a termination signal:
//! - `echo`: answers every request with its own content
//! - `heartbeat`: periodically sends a sync query to `echo`

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beehive_core::{Config, Kernel, Message, Module, ModuleRegistry, Operation, Orchestrator};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "beehive", about = "Beehive module kernel demo")]
struct Args {
    /// JSON config file; defaults apply when omitted.
    #[arg(long, env = "BEEHIVE_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds between heartbeat queries.
    #[arg(long, default_value_t = 5)]
    heartbeat_secs: u64,

    /// Register the echo module as disabled.
    #[arg(long)]
    disable_echo: bool,
}

#[derive(Debug)]
struct EchoModule {
    enabled: bool,
}

#[async_trait]
impl Module for EchoModule {
    fn name(&self) -> &str {
        "echo"
    }

    fn group(&self) -> &str {
        "echo"
    }

    fn enable(&self) -> bool {
        self.enabled
    }

    async fn start(&self, kernel: Arc<Kernel>) {
        while let Ok(msg) = kernel.receive(self.name()).await {
            if msg.is_sync() {
                let reply = Message::new_response(&msg, msg.content().clone());
                kernel.send_resp(reply).await;
            } else {
                tracing::info!("echo got async message {} from {}", msg.id(), msg.source());
            }
        }
        tracing::info!("echo module stopped");
    }
}

#[derive(Debug)]
struct HeartbeatModule {
    every: Duration,
}

#[async_trait]
impl Module for HeartbeatModule {
    fn name(&self) -> &str {
        "heartbeat"
    }

    fn group(&self) -> &str {
        "heartbeat"
    }

    async fn start(&self, kernel: Arc<Kernel>) {
        let cancel = kernel.cancellation_token();
        let mut ticker = tokio::time::interval(self.every);
        let mut beat: u64 = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            beat += 1;

            let query = Message::builder()
                .route(self.name(), "echo")
                .resource_operation("heartbeat", Operation::Query)
                .content(format!("beat {beat}"))
                .build();
            match kernel
                .send_sync("echo", query, kernel.default_sync_timeout())
                .await
            {
                Ok(resp) => tracing::info!("heartbeat {} answered: {:?}", beat, resp.content()),
                Err(e) => tracing::warn!("heartbeat {} failed: {}", beat, e),
            }
        }
        tracing::info!("heartbeat module stopped");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    // Initialize observability
    beehive_core::observability::init_tracing(&config.observability);

    let mut registry = ModuleRegistry::new();
    registry.register(Arc::new(EchoModule {
        enabled: !args.disable_echo,
    }));
    registry.register(Arc::new(HeartbeatModule {
        every: Duration::from_secs(args.heartbeat_secs.max(1)),
    }));

    tracing::info!("Beehive starting with {} modules", registry.len());
    Orchestrator::new(registry, &config).run().await?;
    tracing::info!("Beehive stopped");

    Ok(())
}
