//! Error types shared across the workspace

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, DwhError>;

/// Errors raised by the shared utilities
#[derive(Error, Debug)]
pub enum DwhError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
