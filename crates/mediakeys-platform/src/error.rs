//! Common error types for mediakeys-platform.

use thiserror::Error;

/// Platform-level errors.
///
/// Errors raised on the listener thread are logged and turn the listener
/// inert; only construction misuse reaches the caller.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("media key listening is not supported on this platform")]
    Unsupported,
    #[error("listener already started")]
    AlreadyStarted,
    #[error("a MediaKeys instance is already live in this process")]
    AlreadyInitialized,
    #[error("failed to spawn listener thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[cfg(target_os = "linux")]
    #[error("D-Bus error: {0}")]
    Bus(#[from] zbus::Error),
    #[error("bus name {name} not acquired: {reason}")]
    NameNotAcquired { name: String, reason: String },
    #[error("native resource acquisition failed: {0}")]
    Native(String),
}

/// Result type for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;
