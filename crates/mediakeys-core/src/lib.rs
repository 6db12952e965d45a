//! mediakeys-core: key model, event queue and translation tables.
//!
//! Design goal: keep this crate platform-agnostic so every piece of logic that
//! does not talk to the OS can be tested anywhere. Native listeners live in
//! `mediakeys-platform`.

mod config;
mod key;
pub mod keymap;
mod queue;
mod state;

pub use config::{
    default_config_path, load_config, load_config_or_default, save_config, ConfigError,
    ConfigResult, HostConfig, ListenerConfig,
};
pub use key::MediaKey;
pub use queue::{EventQueue, KeySink};
pub use state::{ListenerState, RunFlag};
