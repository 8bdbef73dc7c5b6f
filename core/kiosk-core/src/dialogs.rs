//! Modal dialog coordination.
//!
//! At most one modal is open at a time. Opening a dialog replaces whatever
//! was open, except the lockout dialog: nothing replaces it and only a
//! correct password releases it.

use crate::error::{KioskError, Result};
use crate::Timestamp;
use chrono::Duration;
use kiosk_protocol::{DialogKind, HostCommand};

/// The inactivity prompt resolves to "return home" after this long.
pub const INACTIVITY_PROMPT_TIMEOUT_SECS: i64 = 15;

pub const EXTENSION_CHOICES_MINUTES: [u32; 4] = [15, 30, 60, 120];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionChoice(u32);

impl ExtensionChoice {
    pub fn from_minutes(minutes: u32) -> Result<Self> {
        if EXTENSION_CHOICES_MINUTES.contains(&minutes) {
            Ok(Self(minutes))
        } else {
            Err(KioskError::InvalidExtension(minutes))
        }
    }

    pub fn minutes(&self) -> u32 {
        self.0
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveDialog {
    InactivityPrompt { deadline: Timestamp },
    Pause,
    PinEntry,
    Lockout,
}

impl ActiveDialog {
    pub fn kind(&self) -> DialogKind {
        match self {
            ActiveDialog::InactivityPrompt { .. } => DialogKind::InactivityPrompt,
            ActiveDialog::Pause => DialogKind::Pause,
            ActiveDialog::PinEntry => DialogKind::PinEntry,
            ActiveDialog::Lockout => DialogKind::Lockout,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DialogCoordinator {
    active: Option<ActiveDialog>,
}

impl DialogCoordinator {
    pub fn active(&self) -> Option<ActiveDialog> {
        self.active
    }

    pub fn active_kind(&self) -> Option<DialogKind> {
        self.active.map(|dialog| dialog.kind())
    }

    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    pub fn is_kind_open(&self, kind: DialogKind) -> bool {
        self.active_kind() == Some(kind)
    }

    pub fn open_inactivity_prompt(&mut self, now: Timestamp) -> Vec<HostCommand> {
        let deadline = now + Duration::seconds(INACTIVITY_PROMPT_TIMEOUT_SECS);
        self.open(ActiveDialog::InactivityPrompt { deadline })
    }

    pub fn open_pause(&mut self) -> Vec<HostCommand> {
        self.open(ActiveDialog::Pause)
    }

    pub fn open_pin_entry(&mut self) -> Vec<HostCommand> {
        self.open(ActiveDialog::PinEntry)
    }

    pub fn open_lockout(&mut self) -> Vec<HostCommand> {
        self.open(ActiveDialog::Lockout)
    }

    /// Closes `kind` if it is the open dialog. The lockout dialog is ignored
    /// here; see [`DialogCoordinator::release_lockout`].
    pub fn close(&mut self, kind: DialogKind) -> Vec<HostCommand> {
        if kind == DialogKind::Lockout || !self.is_kind_open(kind) {
            return Vec::new();
        }
        self.active = None;
        vec![HostCommand::CloseDialog { dialog: kind }]
    }

    /// Closes the lockout dialog after a verified password.
    pub(crate) fn release_lockout(&mut self) -> Vec<HostCommand> {
        if !self.is_kind_open(DialogKind::Lockout) {
            return Vec::new();
        }
        self.active = None;
        vec![HostCommand::CloseDialog {
            dialog: DialogKind::Lockout,
        }]
    }

    pub fn prompt_expired(&self, now: Timestamp) -> bool {
        match self.active {
            Some(ActiveDialog::InactivityPrompt { deadline }) => now >= deadline,
            _ => false,
        }
    }

    fn open(&mut self, dialog: ActiveDialog) -> Vec<HostCommand> {
        let mut commands = Vec::new();
        match self.active {
            Some(ActiveDialog::Lockout) if dialog != ActiveDialog::Lockout => {
                tracing::debug!(
                    requested = dialog.kind().as_str(),
                    "Lockout dialog is open; request dropped"
                );
                return commands;
            }
            Some(ActiveDialog::Lockout) => return commands,
            Some(current) => commands.push(HostCommand::CloseDialog {
                dialog: current.kind(),
            }),
            None => {}
        }

        self.active = Some(dialog);
        let (countdown_secs, extension_minutes) = match dialog {
            ActiveDialog::InactivityPrompt { .. } => (
                Some(INACTIVITY_PROMPT_TIMEOUT_SECS as u64),
                EXTENSION_CHOICES_MINUTES.to_vec(),
            ),
            ActiveDialog::Pause => (None, EXTENSION_CHOICES_MINUTES.to_vec()),
            ActiveDialog::PinEntry | ActiveDialog::Lockout => (None, Vec::new()),
        };
        tracing::debug!(dialog = dialog.kind().as_str(), "Dialog opened");
        commands.push(HostCommand::OpenDialog {
            dialog: dialog.kind(),
            countdown_secs,
            extension_minutes,
        });
        commands
    }
}
