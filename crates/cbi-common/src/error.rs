//! Error types shared across CBI crates

use thiserror::Error;

/// Result type alias for CBI operations
pub type Result<T> = std::result::Result<T, CbiError>;

/// Startup errors: bad configuration or an unknown dataset id
#[derive(Error, Debug)]
pub enum CbiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),
}

impl CbiError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
