//! IPC protocol types and validation for kiosk-daemon.
//!
//! This crate is shared by the daemon, the host shell and `kioskctl` so the
//! wire schema cannot drift between them. The daemon remains the authority on
//! validation; clients reuse the types to construct valid requests.
//!
//! Framing is one JSON object per line over a Unix socket. Inbound traffic is
//! a [`HostEvent`] (user input, dialog responses, media reports, ...);
//! outbound traffic is a list of [`HostCommand`]s the host must apply.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 256 * 1024; // 256KB

const MAX_SECRET_LEN: usize = 1024;
const MAX_KEY_LEN: usize = 32;
const MAX_MEDIA_ELEMENTS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    GetSnapshot,
    Event,
    PollCommands,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }

    pub fn error_with_info(id: Option<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(error),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Inbound: host → daemon
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Pointer,
    Touch,
    Key,
}

/// Answer to the "are you still here" prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "choice", rename_all = "snake_case")]
pub enum InactivityChoice {
    Present,
    Extend { minutes: u32 },
    ReturnHome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaElementKind {
    Video,
    Audio,
    Iframe,
    Embed,
}

/// One media-capable element observed in the active view's document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MediaElementReport {
    pub kind: Option<MediaElementKind>,
    #[serde(default)]
    pub paused: Option<bool>,
    #[serde(default)]
    pub ended: Option<bool>,
    #[serde(default)]
    pub ready_state: Option<u8>,
    #[serde(default)]
    pub current_time: Option<f64>,
    #[serde(default)]
    pub src: Option<String>,
    /// Player state reported by a recognized embed API ("playing", "paused", ...).
    #[serde(default)]
    pub player_state: Option<String>,
}

/// Result of the host running the media inspection script in the active view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MediaReport {
    #[serde(default)]
    pub elements: Vec<MediaElementReport>,
    /// Set when the inspection script threw; the report then counts as silent.
    #[serde(default)]
    pub script_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerAction {
    Shutdown,
    Restart,
    Reload,
}

impl PowerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerAction::Shutdown => "shutdown",
            PowerAction::Restart => "restart",
            PowerAction::Reload => "reload",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    UserInput {
        kind: InputKind,
    },
    /// A view finished navigating. `user_initiated` distinguishes link clicks
    /// from programmatic loads.
    Navigation {
        user_initiated: bool,
        #[serde(default)]
        url: Option<String>,
    },
    NextSite,
    PreviousSite,
    GoHome,
    MediaReport {
        report: MediaReport,
    },
    MediaState {
        playing: bool,
    },
    ToggleHidden,
    PinSubmitted {
        pin: String,
    },
    PinCancelled,
    PasswordSubmitted {
        password: String,
    },
    InactivityResponse {
        response: InactivityChoice,
    },
    OpenPauseDialog,
    /// `minutes: None` is the pause dialog's cancel button.
    PauseResponse {
        #[serde(default)]
        minutes: Option<u32>,
    },
    ShowKeyboard,
    KeyPressed {
        key: String,
    },
    CloseKeyboard,
    OpenPowerMenu,
    PowerRequested {
        action: PowerAction,
    },
    WindowResized {
        width: u32,
        height: u32,
    },
    WindowFocused,
}

impl HostEvent {
    pub fn name(&self) -> &'static str {
        match self {
            HostEvent::UserInput { .. } => "user_input",
            HostEvent::Navigation { .. } => "navigation",
            HostEvent::NextSite => "next_site",
            HostEvent::PreviousSite => "previous_site",
            HostEvent::GoHome => "go_home",
            HostEvent::MediaReport { .. } => "media_report",
            HostEvent::MediaState { .. } => "media_state",
            HostEvent::ToggleHidden => "toggle_hidden",
            HostEvent::PinSubmitted { .. } => "pin_submitted",
            HostEvent::PinCancelled => "pin_cancelled",
            HostEvent::PasswordSubmitted { .. } => "password_submitted",
            HostEvent::InactivityResponse { .. } => "inactivity_response",
            HostEvent::OpenPauseDialog => "open_pause_dialog",
            HostEvent::PauseResponse { .. } => "pause_response",
            HostEvent::ShowKeyboard => "show_keyboard",
            HostEvent::KeyPressed { .. } => "key_pressed",
            HostEvent::CloseKeyboard => "close_keyboard",
            HostEvent::OpenPowerMenu => "open_power_menu",
            HostEvent::PowerRequested { .. } => "power_requested",
            HostEvent::WindowResized { .. } => "window_resized",
            HostEvent::WindowFocused => "window_focused",
        }
    }

    /// Structural validation only. Semantic checks (PIN format, extension
    /// choices) belong to the session controller, which must answer them with
    /// a re-prompt rather than a protocol error.
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        match self {
            HostEvent::PinSubmitted { pin } => require_bounded(pin, "pin", MAX_SECRET_LEN),
            HostEvent::PasswordSubmitted { password } => {
                require_bounded(password, "password", MAX_SECRET_LEN)
            }
            HostEvent::KeyPressed { key } => {
                if key.is_empty() {
                    return Err(ErrorInfo::new("missing_field", "key is required"));
                }
                require_bounded(key, "key", MAX_KEY_LEN)
            }
            HostEvent::MediaReport { report } => {
                if report.elements.len() > MAX_MEDIA_ELEMENTS {
                    return Err(ErrorInfo::new(
                        "invalid_media_report",
                        format!("media report exceeds {} elements", MAX_MEDIA_ELEMENTS),
                    ));
                }
                Ok(())
            }
            HostEvent::WindowResized { width, height } => {
                if *width == 0 || *height == 0 {
                    return Err(ErrorInfo::new(
                        "invalid_window_size",
                        "width and height must be non-zero",
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

pub fn parse_host_event(params: Value) -> Result<HostEvent, ErrorInfo> {
    let event: HostEvent = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("event payload is invalid JSON: {}", err),
        )
    })?;
    event.validate()?;
    Ok(event)
}

fn require_bounded(value: &str, field: &str, max: usize) -> Result<(), ErrorInfo> {
    if value.len() > max {
        return Err(ErrorInfo::new(
            "field_too_long",
            format!("{} must be {} bytes or fewer", field, max),
        ));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Outbound: daemon → host
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewStack {
    Visible,
    Hidden,
}

/// A concrete view the host should attach to its window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewTarget {
    pub stack: ViewStack,
    pub index: usize,
    pub tab_index: usize,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogKind {
    InactivityPrompt,
    Pause,
    PinEntry,
    Lockout,
}

impl DialogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialogKind::InactivityPrompt => "inactivity_prompt",
            DialogKind::Pause => "pause",
            DialogKind::PinEntry => "pin_entry",
            DialogKind::Lockout => "lockout",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinRejection {
    InvalidFormat,
    Incorrect,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum HostCommand {
    AttachView {
        view: ViewTarget,
    },
    DetachAllViews,
    ShowPlaceholder,
    OpenDialog {
        dialog: DialogKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        countdown_secs: Option<u64>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        extension_minutes: Vec<u32>,
    },
    CloseDialog {
        dialog: DialogKind,
    },
    PasswordRejected,
    PinRejected {
        reason: PinRejection,
    },
    ShowKeyboard,
    HideKeyboard,
    /// Sent to every view after an idle auto-close so they can restore focus.
    KeyboardAutoClosed,
    InjectKey {
        key: String,
    },
    ShowPowerMenu {
        actions: Vec<PowerAction>,
    },
    Power {
        action: PowerAction,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// Snapshot
// ═══════════════════════════════════════════════════════════════════════════════

/// Read-only view of the session controller for diagnostics (`get_snapshot`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub locked: bool,
    pub showing_hidden: bool,
    pub current_visible_index: usize,
    pub current_hidden_index: Option<usize>,
    pub visible_sites: usize,
    pub hidden_sites: usize,
    pub active_view: Option<ViewTarget>,
    pub open_dialog: Option<DialogKind>,
    pub keyboard_open: bool,
    pub media_playing: bool,
    pub manual_navigation_mode: bool,
    pub last_user_interaction: String,
    pub site_started_at: String,
    pub inactivity_extension_until: Option<String>,
}
