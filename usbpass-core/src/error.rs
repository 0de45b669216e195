//! Error types for usbpass.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error
//! chains. The controller itself never surfaces errors to producers (bad
//! input is logged and ignored, see the controller module); this type covers
//! the surrounding machinery: configuration, I/O, and daemon plumbing.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for usbpass operations.
pub type Result<T> = std::result::Result<T, UsbPassError>;

/// Main error type for usbpass.
#[derive(Error, Debug)]
pub enum UsbPassError {
    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("I/O error at {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Daemon errors
    #[error("Command channel closed: {reason}")]
    ChannelClosed { reason: String },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl UsbPassError {
    /// Create an Internal error from any error type.
    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(err.to_string())
    }
}
