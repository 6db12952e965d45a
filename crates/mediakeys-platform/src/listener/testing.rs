//! In-process backend for lifecycle tests.

use super::Backend;
use crate::{PlatformError, PlatformResult};
use mediakeys_core::{EventQueue, MediaKey, RunFlag};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Pushes a fixed script of keys once running, then idles until stopped.
pub(crate) struct ScriptedBackend {
    keys: Vec<MediaKey>,
    fail: bool,
    woken: AtomicBool,
    runs: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub(crate) fn new(keys: Vec<MediaKey>) -> Self {
        Self {
            keys,
            fail: false,
            woken: AtomicBool::new(false),
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(vec![])
        }
    }

    pub(crate) fn was_woken(&self) -> bool {
        self.woken.load(Ordering::SeqCst)
    }

    /// Counter of `run` invocations, readable after the backend is moved.
    pub(crate) fn runs(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.runs)
    }
}

impl Backend for ScriptedBackend {
    const NAME: &'static str = "scripted";

    fn run(&self, queue: &EventQueue, flag: &RunFlag) -> PlatformResult<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PlatformError::Native("scripted failure".into()));
        }
        flag.mark_running();
        for key in &self.keys {
            queue.push(*key);
        }
        while flag.is_running() {
            thread::sleep(Duration::from_millis(2));
        }
        Ok(())
    }

    fn wake(&self) {
        self.woken.store(true, Ordering::SeqCst);
    }
}

/// Poll `condition` for up to two seconds.
pub(crate) fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
