//! Socket framing for the kiosk daemon.
//!
//! One newline-terminated JSON request per connection, one JSON response
//! line back. The socket is owner-only; lockout passwords cross it.

use fs_err as fs;
use kiosk_protocol::{ErrorInfo, Request, Response, MAX_REQUEST_BYTES};
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

const READ_TIMEOUT_SECS: u64 = 2;
const SOCKET_MODE: u32 = 0o600;

/// Creates the socket directory, clears a stale socket and binds.
///
/// Refuses to replace a path that is not a socket, or a socket another
/// daemon is still serving.
pub fn bind_socket(path: &Path) -> Result<UnixListener, String> {
    let parent = path
        .parent()
        .ok_or_else(|| format!("Socket path {} has no parent", path.display()))?;
    fs::create_dir_all(parent).map_err(|err| err.to_string())?;

    match std::fs::symlink_metadata(path) {
        Ok(metadata) if !metadata.file_type().is_socket() => {
            return Err(format!(
                "{} exists and is not a socket; refusing to replace it",
                path.display()
            ));
        }
        Ok(_) => {
            if UnixStream::connect(path).is_ok() {
                return Err(format!(
                    "Another kiosk daemon is already listening on {}",
                    path.display()
                ));
            }
            info!(path = %path.display(), "Removing stale daemon socket");
            fs::remove_file(path).map_err(|err| err.to_string())?;
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(format!("Failed to inspect {}: {}", path.display(), err)),
    }

    let listener = UnixListener::bind(path)
        .map_err(|err| format!("Failed to bind {}: {}", path.display(), err))?;
    fs::set_permissions(path, std::fs::Permissions::from_mode(SOCKET_MODE))
        .map_err(|err| err.to_string())?;
    Ok(listener)
}

/// Reads the first request line, bounded by `MAX_REQUEST_BYTES`.
pub fn read_request(stream: &mut UnixStream) -> Result<Request, ErrorInfo> {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(READ_TIMEOUT_SECS)));

    let limit = MAX_REQUEST_BYTES as u64 + 1;
    let mut reader = BufReader::new(Read::by_ref(stream).take(limit));
    let mut line = Vec::new();
    match reader.read_until(b'\n', &mut line) {
        Ok(_) => {}
        Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
            return Err(ErrorInfo::new("read_timeout", "request timed out"));
        }
        Err(err) => {
            return Err(ErrorInfo::new(
                "read_error",
                format!("failed to read request: {}", err),
            ));
        }
    }

    if line.len() > MAX_REQUEST_BYTES {
        return Err(ErrorInfo::new(
            "request_too_large",
            "request exceeded maximum size",
        ));
    }
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    if line.iter().all(u8::is_ascii_whitespace) {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    serde_json::from_slice(&line).map_err(|err| {
        ErrorInfo::new(
            "invalid_json",
            format!("request was not valid JSON: {}", err),
        )
    })
}

pub fn write_response(stream: &mut UnixStream, response: &Response) {
    let mut payload = match serde_json::to_vec(response) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "Failed to serialize response");
            return;
        }
    };
    payload.push(b'\n');
    if let Err(err) = stream.write_all(&payload).and_then(|()| stream.flush()) {
        tracing::debug!(error = %err, "Client closed before the response was written");
    }
}
