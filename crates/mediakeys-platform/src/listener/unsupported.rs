//! Inert backend: every start ends in `FailedInit`.
//!
//! The system backend on targets without a media-key integration. Hosts can
//! also use it directly to get a controller that never listens.

use super::Backend;
use crate::{PlatformError, PlatformResult};
use mediakeys_core::{EventQueue, ListenerConfig, RunFlag};

pub struct UnsupportedBackend;

impl UnsupportedBackend {
    pub fn new(_config: ListenerConfig) -> Self {
        Self
    }
}

impl Backend for UnsupportedBackend {
    const NAME: &'static str = "unsupported";

    fn run(&self, _queue: &EventQueue, _flag: &RunFlag) -> PlatformResult<()> {
        Err(PlatformError::Unsupported)
    }

    fn wake(&self) {}
}
