//! Logical media key events.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A media key press, normalized across platforms.
///
/// The discriminants are part of the host contract: the host's notification
/// carries the integer value, so the order must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKey {
    PlayPause = 0,
    Next = 1,
    Previous = 2,
    Stop = 3,
}

impl MediaKey {
    pub const ALL: [MediaKey; 4] = [
        MediaKey::PlayPause,
        MediaKey::Next,
        MediaKey::Previous,
        MediaKey::Stop,
    ];

    /// Integer value delivered to the host.
    pub fn as_index(self) -> i64 {
        self as i64
    }

    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(MediaKey::PlayPause),
            1 => Some(MediaKey::Next),
            2 => Some(MediaKey::Previous),
            3 => Some(MediaKey::Stop),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MediaKey::PlayPause => "Play/Pause",
            MediaKey::Next => "Next",
            MediaKey::Previous => "Previous",
            MediaKey::Stop => "Stop",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_host_enum_order() {
        for (i, key) in MediaKey::ALL.iter().enumerate() {
            assert_eq!(key.as_index(), i as i64);
            assert_eq!(MediaKey::from_index(i as i64), Some(*key));
        }
        assert_eq!(MediaKey::from_index(4), None);
        assert_eq!(MediaKey::from_index(-1), None);
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(MediaKey::PlayPause.to_string(), "Play/Pause");
        assert_eq!(MediaKey::Stop.to_string(), "Stop");
    }

    #[test]
    fn test_yaml_representation() {
        let yaml = serde_yaml::to_string(&MediaKey::Previous).unwrap();
        assert_eq!(yaml.trim(), "Previous");
        let key: MediaKey = serde_yaml::from_str("Next").unwrap();
        assert_eq!(key, MediaKey::Next);
    }
}
