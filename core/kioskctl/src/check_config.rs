//! `kioskctl check-config`: strict validation of a kiosk document.

use kiosk_core::{try_load_kiosk_config, KioskConfig, SiteDuration, SiteRegistry, ViewSlot};
use std::fmt::Write as _;
use std::path::Path;

pub fn run(path: &Path) -> Result<String, String> {
    let config = try_load_kiosk_config(path).map_err(String::from)?;
    tracing::info!(path = %path.display(), tabs = config.tabs.len(), "Config check passed");
    Ok(summarize(&config))
}

/// Human-readable partition of the configured tabs.
pub fn summarize(config: &KioskConfig) -> String {
    let registry = SiteRegistry::load(&config.tabs);
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} tab(s): {} visible, {} hidden",
        config.tabs.len(),
        registry.visible().len(),
        registry.hidden().len()
    );
    for (index, view) in registry.visible().iter().enumerate() {
        let mode = match view.duration {
            SiteDuration::Rotate(secs) => format!("rotates after {}s", secs),
            SiteDuration::Manual | SiteDuration::Hidden => "manual".to_string(),
        };
        let _ = writeln!(
            out,
            "  visible[{}] tab {} {} ({})",
            index, view.tab_index, view.display_url, mode
        );
    }
    for (index, view) in registry.hidden().iter().enumerate() {
        let _ = writeln!(
            out,
            "  hidden[{}] tab {} {}",
            index, view.tab_index, view.display_url
        );
    }

    let home = match config.home_tab().and_then(|tab| registry.view_for_tab(tab)) {
        Some(ViewSlot::Visible(index)) => format!("visible[{}]", index),
        Some(ViewSlot::Hidden(index)) => format!("hidden[{}]", index),
        None => "disabled".to_string(),
    };
    let _ = writeln!(out, "home: {}", home);
    let _ = writeln!(
        out,
        "inactivity timeout: {}s",
        config.inactivity_timeout_seconds
    );

    if config.lockout_enabled() {
        let timeout = match config.lockout_timeout_minutes {
            0 => "off".to_string(),
            minutes => format!("{}m", minutes),
        };
        let schedule = config
            .lockout_at()
            .map(|time| time.format("%H:%M").to_string())
            .unwrap_or_else(|| "none".to_string());
        let _ = writeln!(
            out,
            "lockout: enabled (idle {}, daily {}, on boot {})",
            timeout, schedule, config.require_password_on_boot
        );
    } else {
        let _ = writeln!(out, "lockout: disabled");
    }
    out
}
