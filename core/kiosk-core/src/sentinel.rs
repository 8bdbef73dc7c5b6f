//! Boot and display-wake marker files.
//!
//! External schedule tooling drops zero-byte markers; the session controller
//! consumes them (delete after use) to trigger the lockout policy.

use fs_err as fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SentinelFiles {
    boot_marker: PathBuf,
    wake_marker: PathBuf,
    /// Markers that fired once but could not be deleted.
    boot_stuck: bool,
    wake_stuck: bool,
}

impl SentinelFiles {
    pub fn new(boot_marker: impl Into<PathBuf>, wake_marker: impl Into<PathBuf>) -> Self {
        Self {
            boot_marker: boot_marker.into(),
            wake_marker: wake_marker.into(),
            boot_stuck: false,
            wake_stuck: false,
        }
    }

    pub fn boot_marker(&self) -> &Path {
        &self.boot_marker
    }

    pub fn wake_marker(&self) -> &Path {
        &self.wake_marker
    }

    pub fn consume_boot_marker(&mut self) -> bool {
        consume_marker(&self.boot_marker, &mut self.boot_stuck)
    }

    pub fn consume_wake_marker(&mut self) -> bool {
        consume_marker(&self.wake_marker, &mut self.wake_stuck)
    }
}

/// Returns true if the marker existed and has not fired yet.
///
/// A marker that cannot be deleted fires once and is then ignored until it
/// disappears, so it cannot re-lock after every unlock.
fn consume_marker(path: &Path, stuck: &mut bool) -> bool {
    if !path.exists() {
        *stuck = false;
        return false;
    }
    match fs::remove_file(path) {
        Ok(()) => {
            *stuck = false;
            true
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            *stuck = false;
            false
        }
        Err(_) if *stuck => false,
        Err(err) => {
            tracing::error!(
                error = %err,
                path = %path.display(),
                "Failed to remove lock marker; ignoring it until it is removed"
            );
            *stuck = true;
            true
        }
    }
}
