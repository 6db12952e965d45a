//! mediakeys-host: a minimal host for the media key listener.
//!
//! Plays the part of the hosting application: decides whether it runs as an
//! editor, creates the controller, polls it once per frame from the main
//! thread and tears it down on Ctrl-C.

mod state;

use clap::Parser;
use crossbeam_channel::{bounded, select, tick};
use mediakeys_core::{default_config_path, load_config_or_default, save_config, HostConfig};
use mediakeys_platform::{MediaKey, MediaKeys};
use state::HostState;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "mediakeys-host")]
#[command(version)]
#[command(about = "Listen for system media keys and log them", long_about = None)]
struct Cli {
    /// Config file (YAML). Defaults to <config_dir>/mediakeys/config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run as an editor context: the listener is never started
    #[arg(long)]
    editor: bool,

    /// Write the default config to the config path and exit
    #[arg(long)]
    write_default_config: bool,
}

fn init_logging(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let path = cli.config.unwrap_or_else(default_config_path);

    if cli.write_default_config {
        init_logging("info");
        return match save_config(&path, &HostConfig::default()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(?path, error = %e, "Failed to write config");
                ExitCode::FAILURE
            }
        };
    }

    let config = match load_config_or_default(&path) {
        Ok(config) => config,
        Err(e) => {
            init_logging("info");
            error!(?path, error = %e, "Failed to load config");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.log_filter);

    let editor = cli.editor || config.editor;
    run(&config, editor)
}

fn run(config: &HostConfig, editor: bool) -> ExitCode {
    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    let media_keys = match MediaKeys::new(&config.listener, || editor) {
        Ok(media_keys) => media_keys,
        Err(e) => {
            error!(error = %e, "Failed to create media key controller");
            return ExitCode::FAILURE;
        }
    };
    info!(
        editor,
        poll_interval_ms = config.poll_interval_ms,
        "Media key host running, press Ctrl-C to quit"
    );

    let frames = tick(config.poll_interval());
    let mut state = HostState::default();
    loop {
        select! {
            recv(frames) -> _ => {
                state.frames += 1;
                media_keys.poll_events_from_main_thread(&mut state);
            }
            recv(shutdown_rx) -> _ => break,
        }
    }

    info!(state = ?media_keys.state(), "Shutting down");
    drop(media_keys);

    for key in MediaKey::ALL {
        info!(key = %key, count = state.delivered(key), "Delivered");
    }
    info!(
        frames = state.frames,
        total = state.total_delivered(),
        "Media key host stopped"
    );
    ExitCode::SUCCESS
}
