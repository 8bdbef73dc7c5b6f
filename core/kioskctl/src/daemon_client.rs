//! Client helper for talking to the kiosk daemon.
//!
//! One request per connection, newline-terminated JSON both ways. Errors come
//! back as display strings; the caller decides whether they are fatal.

use chrono::Utc;
use kiosk_protocol::{
    HostCommand, HostEvent, Method, Request, Response, SessionSnapshot, MAX_REQUEST_BYTES,
    PROTOCOL_VERSION,
};
use serde_json::Value;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

const SOCKET_ENV: &str = "KIOSK_DAEMON_SOCKET";
const SOCKET_NAME: &str = "daemon.sock";
const READ_TIMEOUT_MS: u64 = 6000;
const WRITE_TIMEOUT_MS: u64 = 600;

pub fn send_event(event: &HostEvent) -> Result<Vec<HostCommand>, String> {
    let params =
        serde_json::to_value(event).map_err(|err| format!("Failed to serialize event: {}", err))?;
    let data = call(Method::Event, Some(params))?;
    commands_from(data)
}

pub fn poll_commands() -> Result<Vec<HostCommand>, String> {
    commands_from(call(Method::PollCommands, None)?)
}

pub fn snapshot() -> Result<SessionSnapshot, String> {
    let data = call(Method::GetSnapshot, None)?;
    serde_json::from_value(data).map_err(|err| format!("Unexpected snapshot payload: {}", err))
}

pub fn health() -> Result<Value, String> {
    call(Method::GetHealth, None)
}

fn call(method: Method, params: Option<Value>) -> Result<Value, String> {
    let request = Request {
        protocol_version: PROTOCOL_VERSION,
        method,
        id: Some(make_request_id()),
        params,
    };
    tracing::debug!(method = ?request.method, id = ?request.id, "Sending daemon request");

    let response = send_request(request)?;
    if !response.ok {
        let message = response
            .error
            .map(|err| format!("{}: {}", err.code, err.message))
            .unwrap_or_else(|| "Unknown daemon error".to_string());
        return Err(message);
    }
    Ok(response.data.unwrap_or(Value::Null))
}

fn commands_from(data: Value) -> Result<Vec<HostCommand>, String> {
    match data.get("commands") {
        Some(commands) => serde_json::from_value(commands.clone())
            .map_err(|err| format!("Unexpected commands payload: {}", err)),
        None => Ok(Vec::new()),
    }
}

fn socket_path() -> Result<PathBuf, String> {
    if let Ok(path) = env::var(SOCKET_ENV) {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().ok_or_else(|| "Home directory not found".to_string())?;
    Ok(home.join(".kiosk").join(SOCKET_NAME))
}

fn send_request(request: Request) -> Result<Response, String> {
    let socket = socket_path()?;
    let mut stream = UnixStream::connect(&socket).map_err(|err| {
        format!(
            "Failed to connect to daemon socket {}: {}",
            socket.display(),
            err
        )
    })?;
    let _ = stream.set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS)));
    let _ = stream.set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)));

    serde_json::to_writer(&mut stream, &request)
        .map_err(|err| format!("Failed to write request: {}", err))?;
    stream
        .write_all(b"\n")
        .map_err(|err| format!("Failed to flush request: {}", err))?;
    stream.flush().ok();

    read_response(&mut stream)
}

fn read_response(stream: &mut UnixStream) -> Result<Response, String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err("Response exceeded maximum size".to_string());
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                return Err("Timed out waiting for daemon response".to_string());
            }
            Err(err) => return Err(format!("Failed to read response: {}", err)),
        }
    }

    let response_bytes = match buffer.iter().position(|b| *b == b'\n') {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    if response_bytes.is_empty() {
        return Err("Daemon response was empty".to_string());
    }

    serde_json::from_slice(response_bytes)
        .map_err(|err| format!("Failed to parse response JSON: {}", err))
}

fn make_request_id() -> String {
    format!(
        "kioskctl-{}-{}",
        std::process::id(),
        Utc::now().timestamp_millis()
    )
}
