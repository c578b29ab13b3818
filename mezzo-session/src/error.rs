//! Error types for mezzo-session
//!
//! Module-specific error types using thiserror for clear error propagation.
//! Note that transport commands issued in an invalid state are defined as
//! no-ops, not errors; only genuine failures surface here.

use thiserror::Error;

/// Main error type for the mezzo-session crate
#[derive(Error, Debug)]
pub enum Error {
    /// Media resource could not be loaded (bad URI, missing permission,
    /// unsupported codec)
    #[error("Load error: {0}")]
    Load(String),

    /// Engine command failed after a successful load
    #[error("Engine error: {0}")]
    Engine(String),

    /// Queue management errors
    #[error("Queue error: {0}")]
    Queue(String),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session task is gone (closed or panicked)
    #[error("Session closed")]
    Closed,

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using mezzo-session Error
pub type Result<T> = std::result::Result<T, Error>;
