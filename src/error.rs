use thiserror::Error;

/// Crate-wide error type.
///
/// Configuration and module-resolution failures are fatal and never retried;
/// `NotSupported` is distinct so callers can branch on missing backend
/// capabilities instead of treating them as hard failures.
#[derive(Debug, Error)]
pub enum SqlDriverError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    #[error("Driver module error: {0}")]
    ModuleLoad(String),

    #[error("Not supported by backend: {0}")]
    NotSupported(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Connection extension type mismatch: {0}")]
    ExtensionMismatch(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl SqlDriverError {
    /// Whether this error is the "capability missing" condition rather than
    /// a hard failure.
    #[must_use]
    pub fn is_not_supported(&self) -> bool {
        matches!(self, SqlDriverError::NotSupported(_))
    }
}
