//! User and media activity tracking.
//!
//! Every timer-driven decision in the session controller reads from here:
//! rotation and home return pause while a user is recently active or media is
//! playing, and the lockout inactivity timer measures idle time from the
//! latest interaction.

use crate::Timestamp;
use chrono::Duration;

/// Any interaction pauses rotation and home-return logic for this long.
pub const RECENT_ACTIVITY_WINDOW_SECS: i64 = 60;

/// Media that stopped playing keeps blocking rotation for this long.
pub const MEDIA_GRACE_PERIOD_SECS: i64 = 30;

/// Cadence at which the host's media probe is consulted.
pub const MEDIA_POLL_INTERVAL_SECS: u64 = 3;

#[derive(Debug, Clone)]
pub struct ActivityTracker {
    last_user_interaction: Timestamp,
    media_playing: bool,
    last_media_state_change: Option<Timestamp>,
}

impl ActivityTracker {
    pub fn new(now: Timestamp) -> Self {
        Self {
            last_user_interaction: now,
            media_playing: false,
            last_media_state_change: None,
        }
    }

    pub fn mark_user_activity(&mut self, now: Timestamp) {
        self.last_user_interaction = now;
    }

    /// Records a media poll result. Returns true on a state transition; a
    /// repeated identical poll leaves the change timestamp untouched.
    pub fn mark_media_playing(&mut self, now: Timestamp, playing: bool) -> bool {
        if self.media_playing == playing {
            return false;
        }
        self.media_playing = playing;
        self.last_media_state_change = Some(now);
        true
    }

    pub fn last_user_interaction(&self) -> Timestamp {
        self.last_user_interaction
    }

    pub fn last_media_state_change(&self) -> Option<Timestamp> {
        self.last_media_state_change
    }

    pub fn media_playing(&self) -> bool {
        self.media_playing
    }

    pub fn idle_duration(&self, now: Timestamp) -> Duration {
        now.signed_duration_since(self.last_user_interaction)
    }

    pub fn is_user_recently_active(&self, now: Timestamp) -> bool {
        self.idle_duration(now) < Duration::seconds(RECENT_ACTIVITY_WINDOW_SECS)
    }

    /// True while media plays or within the grace period after it stopped.
    pub fn media_gate_active(&self, now: Timestamp) -> bool {
        if self.media_playing {
            return true;
        }
        self.last_media_state_change
            .map(|changed| {
                now.signed_duration_since(changed) < Duration::seconds(MEDIA_GRACE_PERIOD_SECS)
            })
            .unwrap_or(false)
    }
}
