//! Lifecycle controller and process-wide singleton.
//!
//! A [`MediaKeys`] owns one platform listener and the queue it feeds. The host
//! constructs it once when its extension initializes, polls it from its main
//! thread, and drops it at unload. Construction registers the instance so
//! [`MediaKeys::get_singleton`] can find it; dropping clears the registration.

use crate::listener::{system_listener, PlatformListener};
use crate::{PlatformError, PlatformResult};
use mediakeys_core::{EventQueue, KeySink, ListenerConfig, ListenerState};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, info, warn};

static INSTANCE: Mutex<Option<Weak<MediaKeys>>> = Mutex::new(None);

fn registry() -> MutexGuard<'static, Option<Weak<MediaKeys>>> {
    INSTANCE.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct MediaKeys {
    queue: EventQueue,
    listener: Mutex<Box<dyn PlatformListener>>,
}

impl MediaKeys {
    /// Create the controller with the listener for the current platform.
    ///
    /// `is_editor` is consulted once: in an editor/authoring context no
    /// listener thread is started and the queue stays empty.
    pub fn new(
        config: &ListenerConfig,
        is_editor: impl FnOnce() -> bool,
    ) -> PlatformResult<Arc<Self>> {
        Self::with_listener(Box::new(system_listener(config)), is_editor)
    }

    /// Create the controller around an arbitrary listener.
    ///
    /// Fails only if another instance is still live. Listener start-up
    /// failures are logged and leave the instance inert.
    pub fn with_listener(
        mut listener: Box<dyn PlatformListener>,
        is_editor: impl FnOnce() -> bool,
    ) -> PlatformResult<Arc<Self>> {
        // Host code runs before the registry is locked, so it may look the
        // singleton up.
        let editor = is_editor();

        let mut slot = registry();
        // strong_count rather than upgrade: a temporary Arc dropped here could
        // run Drop while the registry lock is held.
        if slot.as_ref().is_some_and(|weak| weak.strong_count() > 0) {
            return Err(PlatformError::AlreadyInitialized);
        }

        let queue = EventQueue::new();
        if editor {
            info!("Editor context, media key listener not started");
        } else if let Err(e) = listener.start(queue.clone()) {
            warn!(error = %e, "Media key listener not started");
        }

        let this = Arc::new(Self {
            queue,
            listener: Mutex::new(listener),
        });
        *slot = Some(Arc::downgrade(&this));
        debug!("MediaKeys registered");
        Ok(this)
    }

    /// The live instance, if any.
    pub fn get_singleton() -> Option<Arc<Self>> {
        registry().as_ref().and_then(Weak::upgrade)
    }

    /// Deliver every pending key event to `sink`, oldest first.
    ///
    /// Call from the host's main thread, typically once per frame. Never
    /// blocks beyond the queue lock. Returns the number of events delivered.
    pub fn poll_events_from_main_thread<S: KeySink + ?Sized>(&self, sink: &mut S) -> usize {
        self.queue.drain_and_dispatch(sink)
    }

    /// Events waiting for the next poll.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn state(&self) -> ListenerState {
        self.listener().state()
    }

    pub fn is_running(&self) -> bool {
        self.listener().is_running()
    }

    fn listener(&self) -> MutexGuard<'_, Box<dyn PlatformListener>> {
        self.listener.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for MediaKeys {
    fn drop(&mut self) {
        self.listener
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .stop();

        let mut slot = registry();
        let is_self = slot
            .as_ref()
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), self as *const Self));
        if is_self {
            *slot = None;
        }
        info!("MediaKeys shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::testing::{wait_for, ScriptedBackend};
    use crate::listener::NativeListener;
    use mediakeys_core::MediaKey;
    use serial_test::serial;
    use std::sync::atomic::Ordering;
    use std::time::{Duration, Instant};

    fn scripted(keys: Vec<MediaKey>) -> Box<dyn PlatformListener> {
        Box::new(NativeListener::new(ScriptedBackend::new(keys)))
    }

    #[test]
    #[serial]
    fn test_scenario_play_next_stop() {
        let keys = vec![MediaKey::PlayPause, MediaKey::Next, MediaKey::Stop];
        let media_keys = MediaKeys::with_listener(scripted(keys.clone()), || false).unwrap();
        assert!(wait_for(|| media_keys.pending() == 3));

        let mut delivered = Vec::new();
        let count = media_keys.poll_events_from_main_thread(&mut delivered);
        assert_eq!(count, 3);
        assert_eq!(delivered, keys);
        assert_eq!(media_keys.pending(), 0);

        assert_eq!(media_keys.poll_events_from_main_thread(&mut delivered), 0);
    }

    #[test]
    #[serial]
    fn test_editor_context_never_starts_listener() {
        let backend = ScriptedBackend::new(vec![MediaKey::PlayPause]);
        let runs = backend.runs();
        let media_keys =
            MediaKeys::with_listener(Box::new(NativeListener::new(backend)), || true).unwrap();

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(media_keys.state(), ListenerState::Idle);
        assert!(!media_keys.is_running());
        for _ in 0..3 {
            let mut delivered = Vec::new();
            assert_eq!(media_keys.poll_events_from_main_thread(&mut delivered), 0);
        }
        drop(media_keys);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    #[serial]
    fn test_singleton_lifecycle() {
        assert!(MediaKeys::get_singleton().is_none());

        let media_keys = MediaKeys::with_listener(scripted(vec![]), || false).unwrap();
        let found = MediaKeys::get_singleton().unwrap();
        assert!(Arc::ptr_eq(&found, &media_keys));
        drop(found);

        let started = Instant::now();
        drop(media_keys);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(MediaKeys::get_singleton().is_none());
    }

    #[test]
    #[serial]
    fn test_second_live_instance_is_rejected() {
        let first = MediaKeys::with_listener(scripted(vec![]), || false).unwrap();
        let second = MediaKeys::with_listener(scripted(vec![]), || false);
        assert!(matches!(second, Err(PlatformError::AlreadyInitialized)));

        drop(first);
        let third = MediaKeys::with_listener(scripted(vec![]), || true);
        assert!(third.is_ok());
    }

    #[test]
    #[serial]
    fn test_failed_listener_stays_inert() {
        let media_keys = MediaKeys::with_listener(
            Box::new(NativeListener::new(ScriptedBackend::failing())),
            || false,
        )
        .unwrap();

        assert!(wait_for(|| media_keys.state() == ListenerState::FailedInit));
        let mut delivered = Vec::new();
        assert_eq!(media_keys.poll_events_from_main_thread(&mut delivered), 0);
        assert!(MediaKeys::get_singleton().is_some());
    }

    #[test]
    #[serial]
    fn test_editor_check_may_query_singleton() {
        let first = MediaKeys::with_listener(scripted(vec![]), || false).unwrap();

        let mut seen = None;
        let second = MediaKeys::with_listener(scripted(vec![]), || {
            seen = MediaKeys::get_singleton();
            true
        });
        assert!(matches!(second, Err(PlatformError::AlreadyInitialized)));
        assert!(Arc::ptr_eq(&seen.take().unwrap(), &first));

        drop(first);
        let mut saw_none = false;
        let third = MediaKeys::with_listener(scripted(vec![]), || {
            saw_none = MediaKeys::get_singleton().is_none();
            true
        })
        .unwrap();
        assert!(saw_none);
        assert_eq!(third.state(), ListenerState::Idle);
    }

    #[test]
    #[serial]
    fn test_drop_stops_running_listener() {
        let media_keys = MediaKeys::with_listener(scripted(vec![MediaKey::Next]), || false).unwrap();
        assert!(wait_for(|| media_keys.state() == ListenerState::Running));
        drop(media_keys);
        assert!(MediaKeys::get_singleton().is_none());
    }
}
