//! Hidden-site PIN store.
//!
//! The store is a small file holding either a 4-8 digit PIN or the reserved
//! value [`PIN_DISABLED_SENTINEL`]. It is read on every gate invocation so
//! edits by the configuration tooling apply without a restart.
//!
//! The PIN is kept and compared in plaintext, unlike the lockout password.

use crate::error::{KioskError, Result};
use fs_err as fs;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

pub const PIN_DISABLED_SENTINEL: &str = "DISABLED";

static RE_PIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4,8}$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinRequirement {
    /// Hidden sites open without a PIN.
    Disabled,
    Required(String),
    /// Store missing, empty or malformed: entry is denied.
    Unavailable,
}

pub fn validate_pin_input(pin: &str) -> Result<()> {
    if RE_PIN.is_match(pin) {
        Ok(())
    } else {
        Err(KioskError::InvalidPinFormat)
    }
}

#[derive(Debug, Clone)]
pub struct PinStore {
    path: PathBuf,
}

impl PinStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn requirement(&self) -> PinRequirement {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No PIN store; hidden sites locked");
                return PinRequirement::Unavailable;
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read PIN store");
                return PinRequirement::Unavailable;
            }
        };

        let value = content.trim();
        if value.eq_ignore_ascii_case(PIN_DISABLED_SENTINEL) {
            return PinRequirement::Disabled;
        }
        if validate_pin_input(value).is_err() {
            tracing::warn!(path = %self.path.display(), "PIN store holds a malformed PIN");
            return PinRequirement::Unavailable;
        }
        PinRequirement::Required(value.to_string())
    }
}
