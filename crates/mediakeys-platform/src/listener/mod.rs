//! Platform media-key listeners.
//!
//! Each OS has one backend that owns its native subscription and pumps it on a
//! dedicated background thread:
//! - Linux: MPRIS2 player on the session bus via zbus (`linux.rs`)
//! - Windows (64-bit): message-only window receiving `WM_APPCOMMAND` (`windows.rs`)
//! - macOS: listen-only CGEventTap on system-defined events (`macos.rs`)
//! - Anything else, 32-bit Windows included: inert (`unsupported.rs`)
//!
//! [`NativeListener`] provides the thread and lifecycle handling shared by all
//! backends; [`SystemListener`] is the variant compiled for the current target.

use crate::{PlatformError, PlatformResult};
use mediakeys_core::{EventQueue, ListenerConfig, ListenerState, RunFlag};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

#[cfg(target_os = "linux")]
mod linux;

// The window procedure stores its context with Get/SetWindowLongPtrW, which
// only exist on 64-bit Windows.
#[cfg(all(target_os = "windows", target_pointer_width = "64"))]
mod windows;

#[cfg(target_os = "macos")]
mod macos;

mod unsupported;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(target_os = "linux")]
pub use linux::MprisBackend as SystemBackend;

#[cfg(all(target_os = "windows", target_pointer_width = "64"))]
pub use windows::AppCommandBackend as SystemBackend;

#[cfg(target_os = "macos")]
pub use macos::EventTapBackend as SystemBackend;

#[cfg(not(any(
    target_os = "linux",
    all(target_os = "windows", target_pointer_width = "64"),
    target_os = "macos"
)))]
pub use unsupported::UnsupportedBackend as SystemBackend;

pub use unsupported::UnsupportedBackend;

/// The listener variant for the current target.
pub type SystemListener = NativeListener<SystemBackend>;

/// Build the listener for the current target.
pub fn system_listener(config: &ListenerConfig) -> SystemListener {
    NativeListener::new(SystemBackend::new(config.clone()))
}

/// Capability set of a media-key listener.
pub trait PlatformListener: Send {
    /// Spawn the background thread. A listener can be started once.
    fn start(&mut self, queue: EventQueue) -> PlatformResult<()>;

    /// Request termination, unblock the native wait and join the thread.
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    fn state(&self) -> ListenerState;
}

/// OS-specific part of a listener.
pub trait Backend: Send + Sync + 'static {
    const NAME: &'static str;

    /// Runs on the background thread.
    ///
    /// Acquires native resources, calls [`RunFlag::mark_running`], then pumps
    /// native notifications into `queue` until [`RunFlag::is_running`] turns
    /// false. Resources are released before returning, on every path.
    fn run(&self, queue: &EventQueue, flag: &RunFlag) -> PlatformResult<()>;

    /// Called from the owning thread after the stop request so a blocked
    /// native wait returns promptly.
    fn wake(&self);
}

/// Thread and lifecycle handling around a [`Backend`].
pub struct NativeListener<B: Backend> {
    backend: Arc<B>,
    flag: Arc<RunFlag>,
    thread: Option<JoinHandle<()>>,
}

impl<B: Backend> NativeListener<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            flag: Arc::new(RunFlag::new()),
            thread: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: Backend> PlatformListener for NativeListener<B> {
    fn start(&mut self, queue: EventQueue) -> PlatformResult<()> {
        if !self.flag.begin_start() {
            return Err(PlatformError::AlreadyStarted);
        }

        let backend = Arc::clone(&self.backend);
        let flag = Arc::clone(&self.flag);
        let spawned = thread::Builder::new()
            .name(format!("mediakeys-{}", B::NAME))
            .spawn(move || worker(backend, flag, queue));

        match spawned {
            Ok(handle) => {
                self.thread = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.flag.mark_failed();
                Err(PlatformError::Spawn(e))
            }
        }
    }

    fn stop(&mut self) {
        let Some(handle) = self.thread.take() else {
            return;
        };

        if self.flag.request_stop() {
            info!(listener = B::NAME, "Stopping media key listener");
        }
        self.backend.wake();

        if handle.join().is_err() {
            error!(listener = B::NAME, "Media key listener thread panicked");
            self.flag.mark_failed();
        }
    }

    fn is_running(&self) -> bool {
        self.flag.is_running()
    }

    fn state(&self) -> ListenerState {
        self.flag.state()
    }
}

impl<B: Backend> Drop for NativeListener<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker<B: Backend>(backend: Arc<B>, flag: Arc<RunFlag>, queue: EventQueue) {
    info!(listener = B::NAME, "Media key listener thread started");

    match backend.run(&queue, &flag) {
        Ok(()) => {
            flag.mark_stopped();
            if !queue.is_empty() {
                warn!(
                    pending = queue.len(),
                    "Media key listener exiting with undelivered events"
                );
            }
            info!(listener = B::NAME, "Media key listener thread exiting");
        }
        Err(e) => {
            // Not retried: the listener stays inert for the process lifetime.
            error!(listener = B::NAME, error = %e, "Media key listener failed");
            flag.mark_failed();
        }
    }
}
