//! Password lockout policy.
//!
//! Two states: unlocked and locked. The policy decides when to lock
//! (scheduled minute, inactivity, boot or display-wake markers) and verifies
//! unlock attempts against the stored SHA-256 hex digest. Applying a lock or
//! unlock to the session and the host is the engine's job.
//!
//! Failed attempts are not rate limited.

use crate::config::KioskConfig;
use crate::session::RuntimeSession;
use crate::Timestamp;
use chrono::{Duration, NaiveTime, Timelike};
use sha2::{Digest, Sha256};

/// Larger timeouts are clamped to a year; they never fire in practice.
const MAX_TIMEOUT_MINUTES: u64 = 365 * 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockReason {
    Schedule,
    Inactivity,
    Boot,
    DisplayWake,
}

impl LockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockReason::Schedule => "schedule",
            LockReason::Inactivity => "inactivity",
            LockReason::Boot => "boot",
            LockReason::DisplayWake => "display_wake",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    enabled: bool,
    password_hash: String,
    inactivity_timeout: Option<Duration>,
    lock_at: Option<NaiveTime>,
    require_on_boot: bool,
}

impl LockoutPolicy {
    pub fn from_config(config: &KioskConfig) -> Self {
        let inactivity_timeout = match config.lockout_timeout_minutes {
            0 => None,
            minutes => Some(Duration::minutes(minutes.min(MAX_TIMEOUT_MINUTES) as i64)),
        };
        Self {
            enabled: config.lockout_enabled(),
            password_hash: config.lockout_password_hash.trim().to_ascii_lowercase(),
            inactivity_timeout,
            lock_at: config.lockout_at(),
            require_on_boot: config.require_password_on_boot,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn boot_lock_required(&self) -> bool {
        self.enabled && self.require_on_boot
    }

    /// Evaluates the timer-driven triggers for this tick.
    ///
    /// The schedule fires at most once per wall-clock minute; the inactivity
    /// timer is suspended while an extension window is active.
    pub fn check(&self, session: &mut RuntimeSession, now: Timestamp) -> Option<LockReason> {
        if !self.enabled || session.is_locked_out {
            return None;
        }

        if let Some(lock_at) = self.lock_at {
            let minute = now.format("%Y-%m-%d %H:%M").to_string();
            if session.last_lock_check_minute.as_deref() != Some(minute.as_str()) {
                session.last_lock_check_minute = Some(minute);
                if now.hour() == lock_at.hour() && now.minute() == lock_at.minute() {
                    return Some(LockReason::Schedule);
                }
            }
        }

        if let Some(timeout) = self.inactivity_timeout {
            if !session.extension_active(now)
                && now.signed_duration_since(session.lockout_activity_time) >= timeout
            {
                return Some(LockReason::Inactivity);
            }
        }

        None
    }

    pub fn verify(&self, candidate: &str) -> bool {
        if !self.enabled {
            return false;
        }
        let digest = hash_password(candidate);
        constant_time_eq(digest.as_bytes(), self.password_hash.as_bytes())
    }
}

/// Lowercase SHA-256 hex digest, the format stored in `lockoutPasswordHash`.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    const PASSWORD_HASH: &str = "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8";

    fn at(hour: u32, minute: u32, second: u32) -> Timestamp {
        Local
            .with_ymd_and_hms(2026, 1, 15, hour, minute, second)
            .unwrap()
    }

    fn config() -> KioskConfig {
        KioskConfig {
            enable_password_protection: true,
            lockout_password_hash: PASSWORD_HASH.to_string(),
            ..KioskConfig::default()
        }
    }

    #[test]
    fn hashes_to_lowercase_hex() {
        assert_eq!(hash_password("password"), PASSWORD_HASH);
    }

    #[test]
    fn verifies_case_insensitive_stored_hash() {
        let policy = LockoutPolicy::from_config(&KioskConfig {
            lockout_password_hash: PASSWORD_HASH.to_ascii_uppercase(),
            ..config()
        });
        assert!(policy.verify("password"));
        assert!(!policy.verify("Password"));
        assert!(!policy.verify(""));
    }

    #[test]
    fn schedule_fires_once_per_minute() {
        let policy = LockoutPolicy::from_config(&KioskConfig {
            lockout_at_time: "14:30".to_string(),
            ..config()
        });
        let mut session = RuntimeSession::new(at(14, 29, 0));
        assert_eq!(policy.check(&mut session, at(14, 29, 59)), None);
        assert_eq!(
            policy.check(&mut session, at(14, 30, 0)),
            Some(LockReason::Schedule)
        );
        assert_eq!(policy.check(&mut session, at(14, 30, 30)), None);
        assert_eq!(policy.check(&mut session, at(14, 31, 0)), None);
    }

    #[test]
    fn inactivity_lock_respects_threshold_and_extension() {
        let policy = LockoutPolicy::from_config(&KioskConfig {
            lockout_timeout_minutes: 5,
            ..config()
        });
        let start = at(10, 0, 0);
        let mut session = RuntimeSession::new(start);
        assert_eq!(policy.check(&mut session, at(10, 4, 59)), None);

        session.set_extension(at(10, 4, 59), Duration::minutes(15));
        assert_eq!(policy.check(&mut session, at(10, 10, 0)), None);

        session.clear_extension();
        assert_eq!(
            policy.check(&mut session, at(10, 10, 0)),
            Some(LockReason::Inactivity)
        );
    }

    #[test]
    fn disabled_policy_never_locks() {
        let policy = LockoutPolicy::from_config(&KioskConfig {
            enable_password_protection: false,
            lockout_timeout_minutes: 1,
            lockout_at_time: "10:00".to_string(),
            ..config()
        });
        let mut session = RuntimeSession::new(at(10, 0, 0));
        assert_eq!(policy.check(&mut session, at(10, 0, 0)), None);
        assert_eq!(policy.check(&mut session, at(11, 0, 0)), None);
        assert!(!policy.verify("password"));
    }

    #[test]
    fn zero_timeout_disables_inactivity_lock() {
        let policy = LockoutPolicy::from_config(&config());
        let mut session = RuntimeSession::new(at(8, 0, 0));
        assert_eq!(policy.check(&mut session, at(20, 0, 0)), None);
    }
}
