//! Kiosk daemon entrypoint.
//!
//! A single-writer service that owns the kiosk session. The host shell talks
//! to it over a Unix socket: it forwards user input, navigation and dialog
//! answers as events, and polls for the view and dialog commands that ticks
//! produce.

use chrono::Local;
use std::env;
use std::os::unix::net::UnixStream;
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use kiosk_core::activity::MEDIA_POLL_INTERVAL_SECS;
use kiosk_core::{build_probe, load_kiosk_config, KioskEngine, PinStore, SentinelFiles};
use kiosk_protocol::{ErrorInfo, Request, Response};

mod controller;
mod ipc;
mod runtime;

use controller::{Controller, Message};

const TICK_INTERVAL_SECS: u64 = 1;
const REPLY_TIMEOUT_SECS: u64 = 5;

fn main() {
    init_logging();

    let kiosk_dir = match runtime::kiosk_dir() {
        Ok(path) => path,
        Err(err) => {
            error!(error = %err, "Failed to resolve kiosk directory");
            std::process::exit(1);
        }
    };

    let runtime_config = match runtime::load_runtime_config(None) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load daemon config; using defaults");
            runtime::DaemonRuntimeConfig::default()
        }
    };
    let paths = runtime_config.resolve(&kiosk_dir, runtime::socket_override());

    let listener = match ipc::bind_socket(&paths.socket) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, path = %paths.socket.display(), "Failed to bind daemon socket");
            std::process::exit(1);
        }
    };

    let now = Local::now();
    let config = load_kiosk_config(&paths.config);
    let engine = KioskEngine::new(
        &config,
        PinStore::new(&paths.pin),
        SentinelFiles::new(&paths.boot_marker, &paths.wake_marker),
        build_probe(runtime_config.media_probe),
        now,
    );
    let mut controller = Controller::new(engine, now);
    controller.start(now);

    info!(
        socket = %paths.socket.display(),
        config = %paths.config.display(),
        media_probe = ?runtime_config.media_probe,
        "Kiosk daemon started"
    );

    let (sender, receiver) = mpsc::channel();
    spawn_timer(sender.clone(), TICK_INTERVAL_SECS, || Message::Tick);
    spawn_timer(sender.clone(), MEDIA_POLL_INTERVAL_SECS, || Message::MediaPoll);
    thread::spawn(move || controller.run(receiver));

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let sender = sender.clone();
                thread::spawn(move || handle_connection(stream, sender));
            }
            Err(err) => {
                warn!(error = %err, "Failed to accept daemon connection");
            }
        }
    }
}

fn spawn_timer(sender: Sender<Message>, interval_secs: u64, make: fn() -> Message) {
    thread::spawn(move || loop {
        thread::sleep(Duration::from_secs(interval_secs));
        if sender.send(make()).is_err() {
            warn!("Controller stopped; timer exiting");
            return;
        }
    });
}

/// `KIOSK_DEBUG_LOG` forces debug output; otherwise `RUST_LOG`, then info.
fn log_filter(debug_flag: Option<&str>) -> EnvFilter {
    let forced = debug_flag
        .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);
    if forced {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_logging() {
    let flag = env::var("KIOSK_DEBUG_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(flag.as_deref()))
        .init();
}

fn handle_connection(mut stream: UnixStream, controller: Sender<Message>) {
    let response = match ipc::read_request(&mut stream) {
        Ok(request) => {
            tracing::debug!(method = ?request.method, id = ?request.id, "Daemon request received");
            let id = request.id.clone();
            forward_request(request, &controller)
                .unwrap_or_else(|err| Response::error_with_info(id, err))
        }
        Err(err) => {
            warn!(code = %err.code, message = %err.message, "Rejected daemon request");
            Response::error_with_info(None, err)
        }
    };
    ipc::write_response(&mut stream, &response);
}

fn forward_request(request: Request, controller: &Sender<Message>) -> Result<Response, ErrorInfo> {
    let (reply, response) = mpsc::channel();
    controller
        .send(Message::Request { request, reply })
        .map_err(|_| ErrorInfo::new("unavailable", "session controller is not running"))?;
    response
        .recv_timeout(Duration::from_secs(REPLY_TIMEOUT_SECS))
        .map_err(|_| ErrorInfo::new("timeout", "session controller did not answer"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_forces_debug_filter() {
        assert_eq!(log_filter(Some("1")).to_string(), "debug");
        assert_eq!(log_filter(Some(" Yes ")).to_string(), "debug");
    }

    #[test]
    fn forward_reports_stopped_controller() {
        let (sender, receiver) = mpsc::channel();
        drop(receiver);
        let request = Request {
            protocol_version: kiosk_protocol::PROTOCOL_VERSION,
            method: kiosk_protocol::Method::GetHealth,
            id: None,
            params: None,
        };
        let err = forward_request(request, &sender).unwrap_err();
        assert_eq!(err.code, "unavailable");
    }
}
