//! The controller loop: sole owner of the session engine.
//!
//! Timer threads and connection threads never touch the engine. They send a
//! [`Message`] and, for requests, wait on a one-shot reply channel. Every
//! engine mutation therefore happens on this thread, in arrival order.
//!
//! Host commands leave in the order the engine produced them. An event
//! response first carries whatever ticks queued since the last poll, then
//! the event's own commands.

use chrono::Local;
use kiosk_core::{KioskEngine, Timestamp};
use kiosk_protocol::{parse_host_event, HostCommand, Method, Request, Response, PROTOCOL_VERSION};
use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, Sender};
use tracing::{debug, info, warn};

/// Commands produced by ticks wait here until the host polls. Oldest are
/// dropped past this bound.
const MAX_OUTBOX_COMMANDS: usize = 256;

pub enum Message {
    Tick,
    MediaPoll,
    Request {
        request: Request,
        reply: Sender<Response>,
    },
}

pub struct Controller {
    engine: KioskEngine,
    outbox: VecDeque<HostCommand>,
    started_at: Timestamp,
}

impl Controller {
    pub fn new(engine: KioskEngine, now: Timestamp) -> Self {
        Self {
            engine,
            outbox: VecDeque::new(),
            started_at: now,
        }
    }

    /// Runs the engine's startup sequence; its commands wait for the first poll.
    pub fn start(&mut self, now: Timestamp) {
        let commands = self.engine.start(now);
        self.enqueue(commands);
    }

    pub fn run(mut self, receiver: Receiver<Message>) {
        for message in receiver {
            self.dispatch(message, Local::now());
        }
        info!("Controller channel closed; stopping");
    }

    pub fn dispatch(&mut self, message: Message, now: Timestamp) {
        match message {
            Message::Tick => {
                let commands = self.engine.tick(now);
                self.enqueue(commands);
            }
            Message::MediaPoll => self.engine.poll_media(now),
            Message::Request { request, reply } => {
                let response = self.handle_request(request, now);
                if reply.send(response).is_err() {
                    debug!("Requester went away before the response was ready");
                }
            }
        }
    }

    pub fn handle_request(&mut self, request: Request, now: Timestamp) -> Response {
        if request.protocol_version != PROTOCOL_VERSION {
            return Response::error(
                request.id,
                "protocol_mismatch",
                "unsupported protocol version",
            );
        }

        match request.method {
            Method::GetHealth => Response::ok(
                request.id,
                serde_json::json!({
                    "status": "ok",
                    "pid": std::process::id(),
                    "version": env!("CARGO_PKG_VERSION"),
                    "protocol_version": PROTOCOL_VERSION,
                    "started_at": self.started_at.to_rfc3339(),
                    "locked": self.engine.is_locked(),
                    "media_probe": self.engine.media_probe_name(),
                    "queued_commands": self.outbox.len(),
                }),
            ),
            Method::GetSnapshot => match serde_json::to_value(self.engine.snapshot()) {
                Ok(value) => Response::ok(request.id, value),
                Err(err) => Response::error(
                    request.id,
                    "serialization_error",
                    format!("Failed to serialize session snapshot: {}", err),
                ),
            },
            Method::PollCommands => {
                let commands: Vec<HostCommand> = self.outbox.drain(..).collect();
                debug!(count = commands.len(), "Outbox drained");
                Response::ok(request.id, serde_json::json!({ "commands": commands }))
            }
            Method::Event => {
                let params = match request.params {
                    Some(params) => params,
                    None => {
                        return Response::error(
                            request.id,
                            "invalid_params",
                            "event payload is required",
                        )
                    }
                };
                let event = match parse_host_event(params) {
                    Ok(event) => event,
                    Err(err) => return Response::error_with_info(request.id, err),
                };

                debug!(event = event.name(), "Host event received");
                let produced = self.engine.handle_event(event, now);
                let mut commands: Vec<HostCommand> = self.outbox.drain(..).collect();
                if !commands.is_empty() {
                    debug!(count = commands.len(), "Flushing queued commands ahead of event");
                }
                commands.extend(produced);
                Response::ok(
                    request.id,
                    serde_json::json!({ "accepted": true, "commands": commands }),
                )
            }
        }
    }

    fn enqueue(&mut self, commands: Vec<HostCommand>) {
        for command in commands {
            if self.outbox.len() >= MAX_OUTBOX_COMMANDS {
                warn!(
                    capacity = MAX_OUTBOX_COMMANDS,
                    "Outbox full; dropping oldest host command"
                );
                self.outbox.pop_front();
            }
            self.outbox.push_back(command);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use kiosk_core::{build_probe, KioskConfig, MediaProbeKind, PinStore, SentinelFiles, Site};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn at(secs: i64) -> Timestamp {
        Local.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn controller(dir: &TempDir) -> Controller {
        let config = KioskConfig {
            tabs: vec![
                Site::new("https://a.example", 30),
                Site::new("https://b.example", 30),
            ],
            ..KioskConfig::default()
        };
        let engine = KioskEngine::new(
            &config,
            PinStore::new(dir.path().join("pin")),
            SentinelFiles::new(dir.path().join("boot"), dir.path().join("wake")),
            build_probe(MediaProbeKind::None),
            at(0),
        );
        let mut controller = Controller::new(engine, at(0));
        controller.start(at(0));
        controller
    }

    fn request(method: Method, params: Option<Value>) -> Request {
        Request {
            protocol_version: PROTOCOL_VERSION,
            method,
            id: Some("req-1".to_string()),
            params,
        }
    }

    fn polled_commands(controller: &mut Controller, now: Timestamp) -> Vec<Value> {
        let response = controller.handle_request(request(Method::PollCommands, None), now);
        assert!(response.ok);
        response.data.expect("data")["commands"]
            .as_array()
            .cloned()
            .expect("commands array")
    }

    #[test]
    fn startup_and_tick_commands_wait_for_poll() {
        let dir = TempDir::new().expect("temp dir");
        let mut controller = controller(&dir);

        let startup = polled_commands(&mut controller, at(0));
        assert_eq!(startup.len(), 1);
        assert_eq!(startup[0]["command"], "attach_view");
        assert!(polled_commands(&mut controller, at(0)).is_empty());

        for secs in 1..=60 {
            controller.dispatch(Message::Tick, at(secs));
        }
        let rotated = polled_commands(&mut controller, at(60));
        assert_eq!(rotated.len(), 1);
        assert_eq!(rotated[0]["view"]["index"], 1);
    }

    #[test]
    fn event_response_carries_commands() {
        let dir = TempDir::new().expect("temp dir");
        let mut controller = controller(&dir);
        polled_commands(&mut controller, at(0));

        let response = controller.handle_request(
            request(Method::Event, Some(json!({ "type": "open_pause_dialog" }))),
            at(1),
        );
        assert!(response.ok);
        let data = response.data.expect("data");
        assert_eq!(data["commands"][0]["command"], "open_dialog");
        assert_eq!(data["commands"][0]["dialog"], "pause");
    }

    #[test]
    fn queued_tick_commands_precede_event_commands() {
        let dir = TempDir::new().expect("temp dir");
        let mut controller = controller(&dir);
        polled_commands(&mut controller, at(0));

        for secs in 1..=60 {
            controller.dispatch(Message::Tick, at(secs));
        }
        let response = controller.handle_request(
            request(Method::Event, Some(json!({ "type": "next_site" }))),
            at(61),
        );
        let data = response.data.expect("data");
        let commands = data["commands"].as_array().cloned().expect("commands array");
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0]["view"]["index"], 1);
        assert_eq!(commands[1]["view"]["index"], 0);
        assert!(polled_commands(&mut controller, at(61)).is_empty());

        let last_attached = commands
            .iter()
            .rev()
            .find(|command| command["command"] == "attach_view")
            .expect("attach_view");
        assert_eq!(
            last_attached["view"]["index"],
            controller.engine.session().current_visible_index
        );
    }

    #[test]
    fn rejects_protocol_mismatch_and_bad_events() {
        let dir = TempDir::new().expect("temp dir");
        let mut controller = controller(&dir);

        let mut stale = request(Method::GetHealth, None);
        stale.protocol_version = 99;
        let response = controller.handle_request(stale, at(1));
        assert_eq!(response.error.expect("error").code, "protocol_mismatch");

        let response = controller.handle_request(request(Method::Event, None), at(1));
        assert_eq!(response.error.expect("error").code, "invalid_params");

        let response = controller.handle_request(
            request(Method::Event, Some(json!({ "type": "key_pressed", "key": "" }))),
            at(1),
        );
        assert_eq!(response.error.expect("error").code, "missing_field");
    }

    #[test]
    fn snapshot_reports_session_state() {
        let dir = TempDir::new().expect("temp dir");
        let mut controller = controller(&dir);
        let response = controller.handle_request(request(Method::GetSnapshot, None), at(1));
        let data = response.data.expect("data");
        assert_eq!(data["locked"], false);
        assert_eq!(data["visible_sites"], 2);
        assert_eq!(data["active_view"]["url"], "https://a.example");
    }

    #[test]
    fn reply_channel_receives_response() {
        let dir = TempDir::new().expect("temp dir");
        let mut controller = controller(&dir);
        let (reply, receiver) = std::sync::mpsc::channel();
        controller.dispatch(
            Message::Request {
                request: request(Method::GetHealth, None),
                reply,
            },
            at(1),
        );
        let response = receiver.recv().expect("response");
        assert!(response.ok);
        assert_eq!(response.data.expect("data")["status"], "ok");
    }
}
