//! On-screen keyboard state.
//!
//! The keyboard is its own surface, independent of the view stacks. It closes
//! itself after a stretch without keystrokes; only that automatic close is
//! announced to the views.

use crate::Timestamp;
use chrono::Duration;
use kiosk_protocol::HostCommand;

pub const KEYBOARD_IDLE_CLOSE_SECS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Manual,
    Auto,
}

#[derive(Debug, Clone, Default)]
pub struct KeyboardController {
    opened_at: Option<Timestamp>,
    last_used: Option<Timestamp>,
}

impl KeyboardController {
    pub fn is_open(&self) -> bool {
        self.opened_at.is_some()
    }

    pub fn show(&mut self, now: Timestamp) -> Vec<HostCommand> {
        if self.is_open() {
            self.last_used = Some(now);
            return Vec::new();
        }
        self.opened_at = Some(now);
        self.last_used = Some(now);
        tracing::debug!("On-screen keyboard opened");
        vec![HostCommand::ShowKeyboard]
    }

    /// Refreshes the idle timer and forwards the key to the active view.
    pub fn register_keystroke(&mut self, now: Timestamp, key: &str) -> Vec<HostCommand> {
        if !self.is_open() {
            return Vec::new();
        }
        self.last_used = Some(now);
        vec![HostCommand::InjectKey {
            key: key.to_string(),
        }]
    }

    pub fn close(&mut self, reason: CloseReason) -> Vec<HostCommand> {
        if self.opened_at.take().is_none() {
            return Vec::new();
        }
        self.last_used = None;
        tracing::debug!(reason = ?reason, "On-screen keyboard closed");
        match reason {
            CloseReason::Manual => vec![HostCommand::HideKeyboard],
            CloseReason::Auto => vec![HostCommand::HideKeyboard, HostCommand::KeyboardAutoClosed],
        }
    }

    pub fn should_auto_close(&self, now: Timestamp) -> bool {
        match (self.opened_at, self.last_used) {
            (Some(_), Some(last_used)) => {
                now.signed_duration_since(last_used) > Duration::seconds(KEYBOARD_IDLE_CLOSE_SECS)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    fn at(secs: i64) -> Timestamp {
        Local.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn show_is_idempotent() {
        let mut keyboard = KeyboardController::default();
        assert_eq!(keyboard.show(at(0)), vec![HostCommand::ShowKeyboard]);
        assert!(keyboard.show(at(1)).is_empty());
        assert!(keyboard.is_open());
    }

    #[test]
    fn keystrokes_postpone_auto_close() {
        let mut keyboard = KeyboardController::default();
        keyboard.show(at(0));
        keyboard.register_keystroke(at(25), "a");
        assert!(!keyboard.should_auto_close(at(50)));
        assert!(keyboard.should_auto_close(at(56)));
    }

    #[test]
    fn keystroke_while_closed_is_dropped() {
        let mut keyboard = KeyboardController::default();
        assert!(keyboard.register_keystroke(at(0), "a").is_empty());
    }

    #[test]
    fn only_auto_close_notifies_views() {
        let mut keyboard = KeyboardController::default();
        keyboard.show(at(0));
        assert_eq!(
            keyboard.close(CloseReason::Manual),
            vec![HostCommand::HideKeyboard]
        );

        keyboard.show(at(1));
        assert_eq!(
            keyboard.close(CloseReason::Auto),
            vec![HostCommand::HideKeyboard, HostCommand::KeyboardAutoClosed]
        );
        assert!(keyboard.close(CloseReason::Auto).is_empty());
    }
}
