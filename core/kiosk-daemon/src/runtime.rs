//! Daemon runtime configuration.
//!
//! Optional TOML at `~/.kiosk/daemon.toml`. Every field is optional; anything
//! left out resolves to a path under `~/.kiosk/`. The kiosk document itself
//! stays JSON and belongs to the configuration tooling.

use kiosk_core::MediaProbeKind;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

const KIOSK_DIR: &str = ".kiosk";
const SOCKET_NAME: &str = "daemon.sock";
const RUNTIME_CONFIG_NAME: &str = "daemon.toml";
pub const SOCKET_ENV: &str = "KIOSK_DAEMON_SOCKET";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonRuntimeConfig {
    pub config_path: Option<PathBuf>,
    pub pin_path: Option<PathBuf>,
    pub boot_marker_path: Option<PathBuf>,
    pub wake_marker_path: Option<PathBuf>,
    pub socket_path: Option<PathBuf>,
    pub media_probe: MediaProbeKind,
}

/// Concrete locations after defaults and environment overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub config: PathBuf,
    pub pin: PathBuf,
    pub boot_marker: PathBuf,
    pub wake_marker: PathBuf,
    pub socket: PathBuf,
}

impl DaemonRuntimeConfig {
    pub fn resolve(&self, kiosk_dir: &Path, socket_override: Option<PathBuf>) -> ResolvedPaths {
        let pick = |value: &Option<PathBuf>, default: &str| {
            value.clone().unwrap_or_else(|| kiosk_dir.join(default))
        };
        ResolvedPaths {
            config: pick(&self.config_path, "config.json"),
            pin: pick(&self.pin_path, "hidden-pin"),
            boot_marker: pick(&self.boot_marker_path, "boot-lock"),
            wake_marker: pick(&self.wake_marker_path, "wake-lock"),
            socket: socket_override.unwrap_or_else(|| pick(&self.socket_path, SOCKET_NAME)),
        }
    }
}

pub fn kiosk_dir() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or_else(|| "Home directory not found".to_string())?;
    Ok(home.join(KIOSK_DIR))
}

pub fn socket_override() -> Option<PathBuf> {
    env::var(SOCKET_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
}

pub fn load_runtime_config(path: Option<PathBuf>) -> Result<DaemonRuntimeConfig, String> {
    let config_path = match path {
        Some(path) => path,
        None => kiosk_dir()?.join(RUNTIME_CONFIG_NAME),
    };

    if !config_path.exists() {
        return Ok(DaemonRuntimeConfig::default());
    }

    let content = fs_err::read_to_string(&config_path).map_err(|err| {
        format!(
            "Failed to read daemon config {}: {}",
            config_path.display(),
            err
        )
    })?;
    toml::from_str::<DaemonRuntimeConfig>(&content).map_err(|err| {
        format!(
            "Failed to parse daemon config {}: {}",
            config_path.display(),
            err
        )
    })
}
