//! Thread-safe handoff between the listener thread and the host's main thread.

use crate::MediaKey;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// Receiver of delivered key events.
///
/// Implementations are only ever invoked from the thread that calls
/// [`EventQueue::drain_and_dispatch`], so they do not need to be `Send`.
pub trait KeySink {
    fn notify(&mut self, key: MediaKey);
}

impl<F> KeySink for F
where
    F: FnMut(MediaKey),
{
    fn notify(&mut self, key: MediaKey) {
        self(key)
    }
}

impl KeySink for Vec<MediaKey> {
    fn notify(&mut self, key: MediaKey) {
        self.push(key);
    }
}

/// FIFO of pending key events, shared by one producer and one consumer.
///
/// Cloning yields another handle to the same queue. There is no capacity cap:
/// if the host never polls, events accumulate.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    inner: Arc<Mutex<VecDeque<MediaKey>>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // The queue only holds plain values, so a poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, VecDeque<MediaKey>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append an event. Callable from any thread.
    pub fn push(&self, key: MediaKey) {
        self.lock().push_back(key);
        trace!(?key, "Queued media key");
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Take every pending event and deliver it to `sink`, oldest first.
    ///
    /// The batch is taken under the lock and dispatched after releasing it, so
    /// the sink may push into this queue without deadlocking; such events are
    /// delivered on the next drain. Returns the number of events delivered.
    pub fn drain_and_dispatch<S: KeySink + ?Sized>(&self, sink: &mut S) -> usize {
        let batch = std::mem::take(&mut *self.lock());
        let count = batch.len();
        for key in batch {
            sink.notify(key);
        }
        count
    }
}
