//! The in-memory runtime session.
//!
//! One `RuntimeSession` exists per process. It is owned by the engine and
//! lent by reference to the rotation, lockout and dialog logic; nothing keeps
//! session state in globals.

use crate::activity::ActivityTracker;
use crate::sites::ViewSlot;
use crate::Timestamp;
use chrono::Duration;

/// Ceiling for any inactivity extension, whatever the caller asked for.
pub const MAX_EXTENSION_MINUTES: i64 = 4 * 60;

#[derive(Debug, Clone)]
pub struct RuntimeSession {
    pub current_visible_index: usize,
    pub showing_hidden: bool,
    pub current_hidden_index: Option<usize>,
    pub site_start_time: Timestamp,
    pub activity: ActivityTracker,
    pub inactivity_extension_until: Option<Timestamp>,
    pub is_locked_out: bool,
    /// Baseline for the inactivity lock; refreshed by input and by unlocking.
    pub lockout_activity_time: Timestamp,
    /// Set by manual tab switches, cleared on return home. Diagnostics only.
    pub manual_navigation_mode: bool,
    /// Last wall-clock minute the lock schedule was evaluated for.
    pub last_lock_check_minute: Option<String>,
    pub restore_after_unlock: Option<ViewSlot>,
}

impl RuntimeSession {
    pub fn new(now: Timestamp) -> Self {
        Self {
            current_visible_index: 0,
            showing_hidden: false,
            current_hidden_index: None,
            site_start_time: now,
            activity: ActivityTracker::new(now),
            inactivity_extension_until: None,
            is_locked_out: false,
            lockout_activity_time: now,
            manual_navigation_mode: false,
            last_lock_check_minute: None,
            restore_after_unlock: None,
        }
    }

    /// The slot that should be on screen when unlocked.
    pub fn active_slot(&self) -> ViewSlot {
        if self.showing_hidden {
            ViewSlot::Hidden(self.current_hidden_index.unwrap_or(0))
        } else {
            ViewSlot::Visible(self.current_visible_index)
        }
    }

    pub fn mark_user_activity(&mut self, now: Timestamp) {
        self.activity.mark_user_activity(now);
        self.lockout_activity_time = now;
    }

    pub fn extension_active(&self, now: Timestamp) -> bool {
        self.inactivity_extension_until
            .map(|until| now < until)
            .unwrap_or(false)
    }

    /// Suspends inactivity transitions until `now + requested`, clamped.
    pub fn set_extension(&mut self, now: Timestamp, requested: Duration) -> Timestamp {
        let granted = requested.min(Duration::minutes(MAX_EXTENSION_MINUTES));
        if granted < requested {
            tracing::warn!(
                requested_minutes = requested.num_minutes(),
                granted_minutes = granted.num_minutes(),
                "Inactivity extension clamped"
            );
        }
        let until = now + granted;
        self.inactivity_extension_until = Some(until);
        until
    }

    pub fn clear_extension(&mut self) {
        self.inactivity_extension_until = None;
    }

    /// Drops an elapsed extension and restarts every idle baseline at `now`.
    /// Returns true if an extension expired.
    pub fn expire_extension(&mut self, now: Timestamp) -> bool {
        match self.inactivity_extension_until {
            Some(until) if now >= until => {
                self.inactivity_extension_until = None;
                self.site_start_time = now;
                self.mark_user_activity(now);
                true
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
    fn extension_is_clamped_to_four_hours() {
        let mut session = RuntimeSession::new(at(0));
        let until = session.set_extension(at(0), Duration::hours(9));
        assert_eq!(until, at(4 * 3600));
    }

    #[test]
    fn extension_window_is_half_open() {
        let mut session = RuntimeSession::new(at(0));
        session.set_extension(at(0), Duration::minutes(15));
        assert!(session.extension_active(at(899)));
        assert!(!session.extension_active(at(900)));
    }

    #[test]
    fn expiring_extension_resets_baselines() {
        let mut session = RuntimeSession::new(at(0));
        session.set_extension(at(0), Duration::minutes(15));
        assert!(!session.expire_extension(at(10)));
        assert!(session.expire_extension(at(900)));
        assert_eq!(session.inactivity_extension_until, None);
        assert_eq!(session.site_start_time, at(900));
        assert_eq!(session.lockout_activity_time, at(900));
        assert_eq!(session.activity.last_user_interaction(), at(900));
    }

    #[test]
    fn active_slot_follows_hidden_flag() {
        let mut session = RuntimeSession::new(at(0));
        session.current_visible_index = 2;
        assert_eq!(session.active_slot(), ViewSlot::Visible(2));
        session.showing_hidden = true;
        session.current_hidden_index = Some(1);
        assert_eq!(session.active_slot(), ViewSlot::Hidden(1));
    }
}
