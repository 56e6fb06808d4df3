//! Core types for the beehive kernel.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: Strongly-typed message identifiers
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for kernel, shutdown, and logging

mod config;
mod errors;
mod ids;

pub use config::{Config, KernelConfig, ObservabilityConfig, ShutdownConfig};
pub use errors::{Error, Result};
pub use ids::MessageId;
