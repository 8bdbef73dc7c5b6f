use kiosk_protocol::{Method, Request, Response, PROTOCOL_VERSION};
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct DaemonGuard {
    child: Child,
}

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn spawn_daemon(home: &Path) -> Child {
    Command::new(env!("CARGO_BIN_EXE_kiosk-daemon"))
        .env("HOME", home)
        .env_remove("KIOSK_DAEMON_SOCKET")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn kiosk-daemon")
}

fn kiosk_dir(home: &Path) -> PathBuf {
    home.join(".kiosk")
}

fn write_kiosk_config(home: &Path) {
    let dir = kiosk_dir(home);
    std::fs::create_dir_all(&dir).expect("create kiosk dir");
    let config = json!({
        "tabs": [
            { "url": "https://dashboard.example", "duration": 60 },
            { "url": "https://menu.example", "duration": 0 },
            { "url": "https://admin.example", "duration": -1 }
        ],
        "homeTabIndex": 0
    });
    std::fs::write(dir.join("config.json"), config.to_string()).expect("write config");
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if path.exists() && UnixStream::connect(path).is_ok() {
            return;
        }
        sleep(Duration::from_millis(25));
    }
    panic!("Timed out waiting for daemon socket at {}", path.display());
}

fn send_raw(socket: &Path, payload: &[u8]) -> Response {
    let mut stream = UnixStream::connect(socket).expect("Failed to connect to daemon socket");
    stream.write_all(payload).expect("Failed to write request");
    stream.flush().ok();
    read_response(&mut stream)
}

fn send_request(socket: &Path, method: Method, params: Option<Value>) -> Response {
    let request = Request {
        protocol_version: PROTOCOL_VERSION,
        method,
        id: Some("smoke".to_string()),
        params,
    };
    let mut payload = serde_json::to_vec(&request).expect("Failed to serialize request");
    payload.push(b'\n');
    send_raw(socket, &payload)
}

fn read_response(stream: &mut UnixStream) -> Response {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = stream.read(&mut chunk).expect("Failed to read response");
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if chunk[..n].contains(&b'\n') {
            break;
        }
    }

    let response_bytes = match buffer.iter().position(|b| *b == b'\n') {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    serde_json::from_slice(response_bytes).expect("Failed to parse response JSON")
}

#[test]
fn daemon_ipc_session_smoke() {
    let home = TempDir::new().expect("Failed to create temp HOME");
    write_kiosk_config(home.path());
    let socket = kiosk_dir(home.path()).join("daemon.sock");
    let _guard = DaemonGuard {
        child: spawn_daemon(home.path()),
    };

    wait_for_socket(&socket, Duration::from_secs(5));

    let health = send_request(&socket, Method::GetHealth, None);
    assert!(health.ok, "health response was not ok");
    let data = health.data.expect("health data");
    assert_eq!(data["status"], "ok");
    assert_eq!(data["locked"], false);
    assert_eq!(data["media_probe"], "dom_heuristic");

    let polled = send_request(&socket, Method::PollCommands, None);
    assert!(polled.ok);
    let commands = polled.data.expect("poll data")["commands"].clone();
    assert_eq!(commands[0]["command"], "attach_view");
    assert_eq!(commands[0]["view"]["url"], "https://dashboard.example");

    let next = send_request(
        &socket,
        Method::Event,
        Some(json!({ "type": "next_site" })),
    );
    assert!(next.ok, "next_site was rejected");
    let commands = next.data.expect("event data")["commands"].clone();
    assert_eq!(commands[0]["view"]["url"], "https://menu.example");

    let snapshot = send_request(&socket, Method::GetSnapshot, None);
    let data = snapshot.data.expect("snapshot data");
    assert_eq!(data["current_visible_index"], 1);
    assert_eq!(data["hidden_sites"], 1);
    assert_eq!(data["manual_navigation_mode"], true);

    // No PIN store: hidden sites stay closed.
    let hidden = send_request(
        &socket,
        Method::Event,
        Some(json!({ "type": "toggle_hidden" })),
    );
    let commands = hidden.data.expect("event data")["commands"].clone();
    assert_eq!(commands[0]["command"], "pin_rejected");
    assert_eq!(commands[0]["reason"], "unavailable");
}

#[test]
fn daemon_rejects_malformed_requests() {
    let home = TempDir::new().expect("Failed to create temp HOME");
    let socket = kiosk_dir(home.path()).join("daemon.sock");
    let _guard = DaemonGuard {
        child: spawn_daemon(home.path()),
    };
    wait_for_socket(&socket, Duration::from_secs(5));

    let invalid = send_raw(&socket, b"{not json}\n");
    assert!(!invalid.ok);
    assert_eq!(invalid.error.expect("error").code, "invalid_json");

    let empty = send_raw(&socket, b"   \n");
    assert_eq!(empty.error.expect("error").code, "empty_request");

    let unknown_event = send_request(
        &socket,
        Method::Event,
        Some(json!({ "type": "self_destruct" })),
    );
    assert_eq!(unknown_event.error.expect("error").code, "invalid_params");

    // Empty config still runs, with a placeholder instead of a site.
    let polled = send_request(&socket, Method::PollCommands, None);
    let commands = polled.data.expect("poll data")["commands"].clone();
    assert_eq!(commands[0]["command"], "show_placeholder");
}
