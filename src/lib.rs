//! # Beehive Core - Module Communication Kernel
//!
//! In-process message bus for an edge-orchestration runtime, providing:
//! - Per-module mailboxes with FIFO delivery and backpressure
//! - Synchronous request/response correlated by parent message id
//! - Group broadcast, fire-and-forget or all-must-answer
//! - One process-wide cancellation that unblocks every waiting call
//! - Module registry and a lifecycle orchestrator with signal-driven shutdown
//!
//! ## Architecture
//!
//! ```text
//!                  ┌──────────────────────────────────────┐
//!   Registry  ──►  │            Orchestrator              │  ◄── SIGINT/SIGTERM/...
//!                  └──────┬──────────────────┬────────────┘
//!                 spawn   │                  │ cancel + cleanup
//!            ┌────────────▼───┐    ┌─────────▼────────────────────┐
//!            │ Module tasks   │◄──►│           Kernel             │
//!            │ (start/loop)   │    │  mailboxes │ groups │ pending │
//!            └────────────────┘    └──────────────────────────────┘
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod kernel;
pub mod message;
pub mod module;
pub mod orchestrator;
pub mod types;

// Internal utilities
pub mod observability;

pub use kernel::{Kernel, KernelStats};
pub use message::{Content, Message, MessageBuilder, Operation, ResourceType};
pub use module::{Module, ModuleRegistry};
pub use orchestrator::Orchestrator;
pub use types::{Config, Error, MessageId, Result};
