//! Host-side state: the notification sink fed by each poll.

use mediakeys_core::{KeySink, MediaKey};
use std::collections::BTreeMap;
use tracing::info;

/// Counts and logs every delivered key.
#[derive(Debug, Default)]
pub struct HostState {
    pub frames: u64,
    delivered: BTreeMap<i64, u64>,
}

impl HostState {
    pub fn delivered(&self, key: MediaKey) -> u64 {
        self.delivered.get(&key.as_index()).copied().unwrap_or(0)
    }

    pub fn total_delivered(&self) -> u64 {
        self.delivered.values().sum()
    }
}

impl KeySink for HostState {
    fn notify(&mut self, key: MediaKey) {
        *self.delivered.entry(key.as_index()).or_default() += 1;
        info!(key = %key, value = key.as_index(), frame = self.frames, "media_key_pressed");
    }
}
