//! Module registry - enabled and disabled modules by name.
//!
//! Filled during a single-threaded init phase, then handed to the
//! orchestrator by value.

use std::collections::HashMap;
use std::sync::Arc;

use super::Module;

/// Registered modules, split by their `enable` flag.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn Module>>,
    disabled: HashMap<String, Arc<dyn Module>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module. A name that is already taken is overwritten.
    pub fn register(&mut self, module: Arc<dyn Module>) {
        let name = module.name().to_string();
        let replaced = self.modules.remove(&name).or_else(|| self.disabled.remove(&name));
        if replaced.is_some() {
            tracing::warn!("Module {} registered twice, replacing previous entry", name);
        }

        if module.enable() {
            tracing::info!("Module {} registered successfully", name);
            self.modules.insert(name, module);
        } else {
            tracing::info!("Module {} is disabled, not starting it", name);
            self.disabled.insert(name, module);
        }
    }

    /// Enabled modules.
    pub fn modules(&self) -> &HashMap<String, Arc<dyn Module>> {
        &self.modules
    }

    pub fn disabled_modules(&self) -> &HashMap<String, Arc<dyn Module>> {
        &self.disabled
    }

    /// Enabled module by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Module>> {
        self.modules.get(name)
    }

    /// Number of enabled modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
