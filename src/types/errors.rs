//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the beehive kernel.
#[derive(Error, Debug)]
pub enum Error {
    /// Target module has no mailbox (never added, or already cleaned up).
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// A synchronous wait exceeded its deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Process-wide shutdown in progress, or the module was cleaned up.
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// Invalid configuration values.
    #[error("validation error: {0}")]
    Validation(String),

    /// Content could not be converted through the JSON codec.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors (config files, signal registration).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// Convenience constructors
impl Error {
    pub fn module_not_found(module: impl Into<String>) -> Self {
        Self::ModuleNotFound(module.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }

    pub fn is_module_not_found(&self) -> bool {
        matches!(self, Error::ModuleNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = Error::module_not_found("edged");
        assert_eq!(err.to_string(), "module not found: edged");

        let err = Error::timeout("sync call to twin after 2s");
        assert!(err.to_string().starts_with("timeout:"));
    }

    #[test]
    fn test_kind_predicates() {
        assert!(Error::cancelled("shutdown").is_cancelled());
        assert!(Error::timeout("x").is_timeout());
        assert!(Error::module_not_found("x").is_module_not_found());
        assert!(!Error::validation("x").is_cancelled());
    }

    #[test]
    fn test_serde_error_converts() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
