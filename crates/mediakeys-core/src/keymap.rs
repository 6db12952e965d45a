//! Translation tables from native notifications to [`MediaKey`].
//!
//! These are pure functions so every platform's table can be exercised on any
//! host. Unmapped inputs return `None` and must not touch the queue.

use crate::MediaKey;

/// MPRIS2 protocol constants (Linux session bus).
pub mod mpris {
    /// Well-known player identity requested on the session bus.
    pub const BUS_NAME: &str = "org.mpris.MediaPlayer2.godot";
    pub const OBJECT_PATH: &str = "/org/mpris/MediaPlayer2";
    pub const ROOT_INTERFACE: &str = "org.mpris.MediaPlayer2";
    pub const PLAYER_INTERFACE: &str = "org.mpris.MediaPlayer2.Player";
}

/// GNOME settings daemon media-keys service.
pub mod settings_daemon {
    pub const DESTINATION: &str = "org.gnome.SettingsDaemon";
    pub const PATH: &str = "/org/gnome/SettingsDaemon/MediaKeys";
    pub const INTERFACE: &str = "org.gnome.SettingsDaemon.MediaKeys";
    pub const KEY_PRESSED_SIGNAL: &str = "MediaPlayerKeyPressed";
    pub const GRAB_METHOD: &str = "GrabMediaPlayerKeys";
}

/// Win32 `WM_APPCOMMAND` command ids.
pub mod app_command {
    pub const MEDIA_NEXTTRACK: u16 = 11;
    pub const MEDIA_PREVIOUSTRACK: u16 = 12;
    pub const MEDIA_STOP: u16 = 13;
    pub const MEDIA_PLAY_PAUSE: u16 = 14;
    /// `FAPPCOMMAND_MASK`: device bits in the high word of lparam.
    pub const DEVICE_MASK: u16 = 0xF000;
}

/// macOS `NSSystemDefined` aux-button key types (`NX_KEYTYPE_*`).
pub mod nx_keytype {
    pub const PLAY: i64 = 16;
    pub const NEXT: i64 = 17;
    pub const PREVIOUS: i64 = 18;
    pub const FAST: i64 = 19;
    pub const REWIND: i64 = 20;
    /// `NSEventSubtype` for aux control buttons.
    pub const AUX_CONTROL_BUTTONS_SUBTYPE: i16 = 8;
    /// Key state nibble for a press.
    pub const KEY_DOWN_STATE: i64 = 0x0A;
}

/// Map an MPRIS2 `Player` method name.
pub fn from_mpris_method(member: &str) -> Option<MediaKey> {
    match member {
        "PlayPause" | "Play" | "Pause" => Some(MediaKey::PlayPause),
        "Next" => Some(MediaKey::Next),
        "Previous" => Some(MediaKey::Previous),
        "Stop" => Some(MediaKey::Stop),
        _ => None,
    }
}

/// Map the key name carried by `MediaPlayerKeyPressed`.
///
/// Matching is exact and case-sensitive.
pub fn from_settings_daemon_key(key_name: &str) -> Option<MediaKey> {
    match key_name {
        "Next" => Some(MediaKey::Next),
        "Play" | "Pause" | "PlayPause" => Some(MediaKey::PlayPause),
        "Previous" => Some(MediaKey::Previous),
        "Stop" => Some(MediaKey::Stop),
        _ => None,
    }
}

/// `GET_APPCOMMAND_LPARAM`: command id from a `WM_APPCOMMAND` lparam.
pub fn app_command_from_lparam(lparam: isize) -> u16 {
    let hiword = ((lparam as usize >> 16) & 0xFFFF) as u16;
    hiword & !app_command::DEVICE_MASK
}

/// Map a `WM_APPCOMMAND` command id.
pub fn from_app_command(cmd: u16) -> Option<MediaKey> {
    match cmd {
        app_command::MEDIA_PLAY_PAUSE => Some(MediaKey::PlayPause),
        app_command::MEDIA_NEXTTRACK => Some(MediaKey::Next),
        app_command::MEDIA_PREVIOUSTRACK => Some(MediaKey::Previous),
        app_command::MEDIA_STOP => Some(MediaKey::Stop),
        _ => None,
    }
}

/// Decode an `NSSystemDefined` event from its `subtype` and `data1`.
///
/// `data1` packs the key type in bits 16..32 and the key flags in bits 0..16,
/// whose high byte is the key state. Only presses are reported.
pub fn from_system_defined(subtype: i16, data1: i64) -> Option<MediaKey> {
    if subtype != nx_keytype::AUX_CONTROL_BUTTONS_SUBTYPE {
        return None;
    }
    let key_type = (data1 & 0xFFFF_0000) >> 16;
    let key_state = (data1 & 0xFF00) >> 8;
    if key_state != nx_keytype::KEY_DOWN_STATE {
        return None;
    }
    match key_type {
        nx_keytype::PLAY => Some(MediaKey::PlayPause),
        nx_keytype::NEXT | nx_keytype::FAST => Some(MediaKey::Next),
        nx_keytype::PREVIOUS | nx_keytype::REWIND => Some(MediaKey::Previous),
        _ => None,
    }
}
