//! Error types for kiosk-core operations.
//!
//! Runtime paths (tick, event handling, sentinel and PIN reads) degrade
//! instead of returning these; they surface only from strict entry points
//! such as [`crate::config::try_load_kiosk_config`] and input validation.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum KioskError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Invalid site at tab {index}: {reason}")]
    InvalidSite { index: usize, reason: String },

    // ─────────────────────────────────────────────────────────────────────
    // Input Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("PIN must be 4 to 8 digits")]
    InvalidPinFormat,

    #[error("Unsupported extension of {0} minutes")]
    InvalidExtension(u32),

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Results using KioskError.
pub type Result<T> = std::result::Result<T, KioskError>;

impl From<KioskError> for String {
    fn from(err: KioskError) -> String {
        err.to_string()
    }
}
