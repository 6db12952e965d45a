//! Linux listener: an MPRIS2 player on the session bus.
//!
//! Desktop environments deliver media keys either as method calls on the
//! active player's `org.mpris.MediaPlayer2.Player` interface or, on GNOME, as
//! targeted `MediaPlayerKeyPressed` signals from the settings daemon. Both are
//! handled here.
//!
//! The bus connection runs on a current-thread tokio runtime owned by the
//! listener thread, so method-call dispatch happens only while the dispatch
//! loop below is awaiting.

use super::Backend;
use crate::{PlatformError, PlatformResult};
use futures_util::StreamExt;
use mediakeys_core::keymap::{self, mpris, settings_daemon};
use mediakeys_core::{EventQueue, ListenerConfig, RunFlag};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};
use zbus::fdo::{RequestNameFlags, RequestNameReply};
use zbus::message::Type as MessageType;
use zbus::{interface, Connection, MatchRule, Message, MessageStream};

const IDENTITY: &str = "Media Keys";

pub struct MprisBackend {
    config: ListenerConfig,
}

impl MprisBackend {
    pub fn new(config: ListenerConfig) -> Self {
        Self { config }
    }

    async fn serve(&self, queue: &EventQueue, flag: &RunFlag) -> PlatformResult<()> {
        let connection = Connection::session().await?;
        acquire_name(&connection).await?;

        let object_server = connection.object_server();
        object_server.at(mpris::OBJECT_PATH, RootInterface).await?;
        object_server
            .at(
                mpris::OBJECT_PATH,
                PlayerInterface {
                    queue: queue.clone(),
                },
            )
            .await?;
        info!(path = mpris::OBJECT_PATH, "MPRIS2 interface registered");

        let mut signals = match key_pressed_stream(&connection).await {
            Ok(stream) => {
                debug!("Settings daemon signal match rule added");
                Some(stream)
            }
            Err(e) => {
                warn!(error = %e, "Failed to add settings daemon match rule");
                None
            }
        };

        if self.config.grab_media_keys {
            grab_media_keys(&connection, self.config.grab_timeout()).await;
        }

        if flag.mark_running() {
            info!("Listening for media key events");
        }

        let slice = self.config.dispatch_timeout();
        while flag.is_running() {
            let Some(stream) = signals.as_mut() else {
                tokio::time::sleep(slice).await;
                continue;
            };

            match timeout(slice, stream.next()).await {
                Ok(Some(Ok(message))) => handle_key_pressed(&message, queue),
                Ok(Some(Err(e))) => debug!(error = %e, "Ignoring unreadable bus message"),
                Ok(None) => {
                    warn!("Settings daemon signal stream closed");
                    signals = None;
                }
                Err(_) => {}
            }
        }

        // Reverse acquisition order. The bus daemon releases the well-known
        // name when the connection goes away.
        drop(signals);
        drop(connection);
        debug!("Session bus connection closed");
        Ok(())
    }
}

impl Backend for MprisBackend {
    const NAME: &'static str = "mpris";

    fn run(&self, queue: &EventQueue, flag: &RunFlag) -> PlatformResult<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| PlatformError::Native(format!("tokio runtime: {e}")))?;
        runtime.block_on(self.serve(queue, flag))
    }

    // The dispatch loop wakes every `dispatch_timeout_ms` on its own.
    fn wake(&self) {}
}

async fn acquire_name(connection: &Connection) -> PlatformResult<()> {
    info!(name = mpris::BUS_NAME, "Registering as MPRIS2 player");

    let flags = RequestNameFlags::ReplaceExisting | RequestNameFlags::DoNotQueue;
    match connection
        .request_name_with_flags(mpris::BUS_NAME, flags)
        .await
    {
        Ok(RequestNameReply::PrimaryOwner) | Ok(RequestNameReply::AlreadyOwner) => {
            info!(name = mpris::BUS_NAME, "Acquired MPRIS2 bus name");
            Ok(())
        }
        Ok(reply) => Err(PlatformError::NameNotAcquired {
            name: mpris::BUS_NAME.into(),
            reason: format!("{reply:?}"),
        }),
        Err(e) => Err(PlatformError::NameNotAcquired {
            name: mpris::BUS_NAME.into(),
            reason: e.to_string(),
        }),
    }
}

async fn key_pressed_stream(connection: &Connection) -> zbus::Result<MessageStream> {
    let rule = MatchRule::builder()
        .msg_type(MessageType::Signal)
        .interface(settings_daemon::INTERFACE)?
        .member(settings_daemon::KEY_PRESSED_SIGNAL)?
        .build();
    MessageStream::for_match_rule(rule, connection, None).await
}

/// Ask the settings daemon to route media keys to us first. Best effort.
async fn grab_media_keys(connection: &Connection, limit: Duration) {
    let call = connection.call_method(
        Some(settings_daemon::DESTINATION),
        settings_daemon::PATH,
        Some(settings_daemon::INTERFACE),
        settings_daemon::GRAB_METHOD,
        &(mpris::BUS_NAME, 0u32),
    );

    match timeout(limit, call).await {
        Ok(Ok(_)) => info!("GrabMediaPlayerKeys succeeded"),
        Ok(Err(e)) => warn!(error = %e, "GrabMediaPlayerKeys call failed"),
        Err(_) => warn!(?limit, "GrabMediaPlayerKeys timed out"),
    }
}

/// `MediaPlayerKeyPressed(s application, s key)`.
fn handle_key_pressed(message: &Message, queue: &EventQueue) {
    let header = message.header();
    let is_key_pressed = header
        .member()
        .is_some_and(|m| m.as_str() == settings_daemon::KEY_PRESSED_SIGNAL);
    if !is_key_pressed {
        return;
    }

    let Ok((_application, key_name)) = message.body().deserialize::<(String, String)>() else {
        return;
    };
    trace!(key_name = %key_name, "MediaPlayerKeyPressed");

    if let Some(key) = keymap::from_settings_daemon_key(&key_name) {
        queue.push(key);
        debug!(?key, "Queued media key (settings daemon)");
    }
}

struct RootInterface;

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootInterface {
    fn raise(&self) {}

    fn quit(&self) {}

    #[zbus(property)]
    fn can_quit(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn can_raise(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn has_track_list(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn identity(&self) -> String {
        IDENTITY.into()
    }

    #[zbus(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        Vec::new()
    }

    #[zbus(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        Vec::new()
    }
}

struct PlayerInterface {
    queue: EventQueue,
}

impl PlayerInterface {
    fn handle(&self, member: &str) {
        if let Some(key) = keymap::from_mpris_method(member) {
            self.queue.push(key);
            debug!(member, ?key, "Queued media key (MPRIS)");
        }
    }
}

/// Methods outside the key table (Seek, OpenUri, ...) are not exported and
/// get the bus's UnknownMethod reply.
#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerInterface {
    fn play_pause(&self) {
        self.handle("PlayPause");
    }

    fn play(&self) {
        self.handle("Play");
    }

    fn pause(&self) {
        self.handle("Pause");
    }

    fn next(&self) {
        self.handle("Next");
    }

    fn previous(&self) {
        self.handle("Previous");
    }

    fn stop(&self) {
        self.handle("Stop");
    }

    #[zbus(property)]
    fn can_control(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_play(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_pause(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_next(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_previous(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::testing::wait_for;
    use crate::listener::{NativeListener, PlatformListener};
    use mediakeys_core::{ListenerState, MediaKey};
    use serial_test::serial;
    use std::time::Instant;
    use zbus::object_server::Interface;

    fn key_pressed(application: &str, key: &str) -> Message {
        Message::signal(
            settings_daemon::PATH,
            settings_daemon::INTERFACE,
            settings_daemon::KEY_PRESSED_SIGNAL,
        )
        .unwrap()
        .build(&(application, key))
        .unwrap()
    }

    #[test]
    fn test_player_methods_queue_keys() {
        let queue = EventQueue::new();
        let player = PlayerInterface {
            queue: queue.clone(),
        };

        player.pause();
        player.next();
        player.previous();
        player.stop();
        player.play();

        let mut delivered = Vec::new();
        queue.drain_and_dispatch(&mut delivered);
        assert_eq!(
            delivered,
            vec![
                MediaKey::PlayPause,
                MediaKey::Next,
                MediaKey::Previous,
                MediaKey::Stop,
                MediaKey::PlayPause,
            ]
        );
    }

    #[test]
    fn test_key_pressed_signal() {
        let queue = EventQueue::new();
        handle_key_pressed(&key_pressed("gnome-settings-daemon", "Stop"), &queue);
        handle_key_pressed(&key_pressed("gnome-settings-daemon", "VolumeUp"), &queue);
        handle_key_pressed(&key_pressed("gnome-settings-daemon", "next"), &queue);

        let mut delivered = Vec::new();
        queue.drain_and_dispatch(&mut delivered);
        assert_eq!(delivered, vec![MediaKey::Stop]);
    }

    #[test]
    fn test_key_pressed_with_wrong_body_is_ignored() {
        let queue = EventQueue::new();
        let message = Message::signal(
            settings_daemon::PATH,
            settings_daemon::INTERFACE,
            settings_daemon::KEY_PRESSED_SIGNAL,
        )
        .unwrap()
        .build(&("only-one-argument",))
        .unwrap();

        handle_key_pressed(&message, &queue);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_interface_names_match_protocol_constants() {
        assert_eq!(RootInterface::name().as_str(), mpris::ROOT_INTERFACE);
        assert_eq!(PlayerInterface::name().as_str(), mpris::PLAYER_INTERFACE);
    }

    // Bus-backed tests need a session bus (e.g. under `dbus-run-session`).
    fn session_bus_available() -> bool {
        std::env::var_os("DBUS_SESSION_BUS_ADDRESS").is_some()
    }

    fn bus_listener() -> NativeListener<MprisBackend> {
        NativeListener::new(MprisBackend::new(ListenerConfig {
            grab_media_keys: false,
            ..ListenerConfig::default()
        }))
    }

    fn client_runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    async fn call_player(client: &Connection, method: &str) -> zbus::Result<Message> {
        client
            .call_method(
                Some(mpris::BUS_NAME),
                mpris::OBJECT_PATH,
                Some(mpris::PLAYER_INTERFACE),
                method,
                &(),
            )
            .await
    }

    #[test]
    #[serial(session_bus)]
    fn test_session_bus_delivers_methods_and_signals_in_order() {
        if !session_bus_available() {
            eprintln!("DBUS_SESSION_BUS_ADDRESS unset, skipping");
            return;
        }

        let queue = EventQueue::new();
        let mut listener = bus_listener();
        listener.start(queue.clone()).unwrap();
        assert!(wait_for(|| listener.state() == ListenerState::Running));

        client_runtime().block_on(async {
            let client = Connection::session().await.unwrap();
            for method in ["Next", "Pause", "Stop"] {
                call_player(&client, method).await.unwrap();
            }

            match call_player(&client, "Seek").await {
                Err(zbus::Error::MethodError(name, _, _)) => {
                    assert_eq!(name.as_str(), "org.freedesktop.DBus.Error.UnknownMethod");
                }
                other => panic!("expected UnknownMethod, got {other:?}"),
            }

            client
                .emit_signal(
                    Some(mpris::BUS_NAME),
                    settings_daemon::PATH,
                    settings_daemon::INTERFACE,
                    settings_daemon::KEY_PRESSED_SIGNAL,
                    &("mediakeys-test", "Previous"),
                )
                .await
                .unwrap();
        });

        assert!(wait_for(|| queue.len() == 4));
        let mut delivered = Vec::new();
        queue.drain_and_dispatch(&mut delivered);
        assert_eq!(
            delivered,
            vec![
                MediaKey::Next,
                MediaKey::PlayPause,
                MediaKey::Stop,
                MediaKey::Previous,
            ]
        );

        let started = Instant::now();
        listener.stop();
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(listener.state(), ListenerState::Stopped);
    }

    #[test]
    #[serial(session_bus)]
    fn test_name_held_elsewhere_fails_init() {
        if !session_bus_available() {
            eprintln!("DBUS_SESSION_BUS_ADDRESS unset, skipping");
            return;
        }

        let runtime = client_runtime();
        // Held without AllowReplacement, so ReplaceExisting cannot take it.
        let holder = runtime.block_on(async {
            let holder = Connection::session().await.unwrap();
            for _ in 0..20 {
                let reply = holder
                    .request_name_with_flags(mpris::BUS_NAME, RequestNameFlags::DoNotQueue.into())
                    .await
                    .unwrap();
                if matches!(reply, RequestNameReply::PrimaryOwner) {
                    return holder;
                }
                // A previous owner may still be disconnecting.
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            panic!("could not take {}", mpris::BUS_NAME);
        });

        let queue = EventQueue::new();
        let mut listener = bus_listener();
        listener.start(queue.clone()).unwrap();
        assert!(wait_for(|| listener.state() == ListenerState::FailedInit));

        listener.stop();
        assert_eq!(listener.state(), ListenerState::FailedInit);
        assert!(queue.is_empty());
        drop(holder);
    }
}
