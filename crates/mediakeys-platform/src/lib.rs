//! mediakeys-platform: OS boundary for system media-key listening.
//!
//! This crate provides:
//! - One media-key listener per OS, each on its own background thread
//! - The lifecycle controller that owns the listener and the event queue
//! - The process-wide singleton the host looks the controller up through
//!
//! ## Module Structure
//!
//! - `error` - Common error types
//! - `listener` - `PlatformListener` abstraction and the per-OS backends
//! - `media_keys` - Lifecycle controller, singleton and poll entry point

mod error;
mod listener;
mod media_keys;

// Re-export error types
pub use error::{PlatformError, PlatformResult};

// Re-export listeners
pub use listener::{
    system_listener, Backend, NativeListener, PlatformListener, SystemBackend, SystemListener,
    UnsupportedBackend,
};

// Re-export controller
pub use media_keys::MediaKeys;

// Re-export the core types hosts need alongside the controller
pub use mediakeys_core::{KeySink, ListenerConfig, ListenerState, MediaKey};
