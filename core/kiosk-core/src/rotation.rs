//! Rotation and home-return decisions.
//!
//! Pure functions over the session and registry; the engine applies the
//! result. Both decisions sit behind the media and recent-activity gates,
//! which the engine evaluates first.

use crate::session::RuntimeSession;
use crate::sites::{SiteDuration, SiteRegistry, ViewSlot};
use crate::Timestamp;
use chrono::Duration;

/// Durations beyond a year are clamped; such a site effectively never rotates.
const MAX_SITE_DURATION_SECS: u64 = 365 * 24 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationDecision {
    /// Switch to this visible index.
    Advance { to: usize },
    /// The current site's time is up but no other site rotates; restart its timer.
    Restart,
    Hold,
}

pub fn evaluate_rotation(
    session: &RuntimeSession,
    registry: &SiteRegistry,
    now: Timestamp,
    dialog_open: bool,
) -> RotationDecision {
    if session.showing_hidden
        || registry.visible().len() <= 1
        || dialog_open
        || session.extension_active(now)
    {
        return RotationDecision::Hold;
    }

    let current = session.current_visible_index;
    let Some(view) = registry.visible().get(current) else {
        return RotationDecision::Hold;
    };
    let SiteDuration::Rotate(secs) = view.duration else {
        return RotationDecision::Hold;
    };

    let elapsed = now.signed_duration_since(session.site_start_time);
    if elapsed < Duration::seconds(secs.min(MAX_SITE_DURATION_SECS) as i64) {
        return RotationDecision::Hold;
    }

    match registry.next_rotating(current) {
        Some(to) => RotationDecision::Advance { to },
        None => RotationDecision::Restart,
    }
}

/// Whether the inactivity prompt should be raised to offer a return home.
///
/// Applies only away from home on a hidden or manual page; rotating pages
/// move on by themselves.
pub fn home_return_due(
    session: &RuntimeSession,
    registry: &SiteRegistry,
    home: Option<ViewSlot>,
    timeout: Duration,
    now: Timestamp,
    dialog_open: bool,
) -> bool {
    let Some(home) = home else {
        return false;
    };
    if session.active_slot() == home {
        return false;
    }

    let away_from_rotation = session.showing_hidden
        || registry
            .visible()
            .get(session.current_visible_index)
            .map(|view| view.duration == SiteDuration::Manual)
            .unwrap_or(false);
    if !away_from_rotation {
        return false;
    }

    if dialog_open || session.extension_active(now) {
        return false;
    }

    session.activity.idle_duration(now) >= timeout
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Site;
    use chrono::{Local, TimeZone};

    fn at(secs: i64) -> Timestamp {
        Local.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn registry(durations: &[i64]) -> SiteRegistry {
        let tabs: Vec<Site> = durations
            .iter()
            .enumerate()
            .map(|(i, d)| Site::new(format!("https://site{}.example", i), *d))
            .collect();
        SiteRegistry::load(&tabs)
    }

    #[test]
    fn advances_when_duration_elapsed() {
        let registry = registry(&[30, 0, 45]);
        let session = RuntimeSession::new(at(0));
        assert_eq!(
            evaluate_rotation(&session, &registry, at(29), false),
            RotationDecision::Hold
        );
        assert_eq!(
            evaluate_rotation(&session, &registry, at(30), false),
            RotationDecision::Advance { to: 2 }
        );
    }

    #[test]
    fn holds_on_manual_site_or_with_dialog() {
        let registry = registry(&[30, 0]);
        let mut session = RuntimeSession::new(at(0));
        assert_eq!(
            evaluate_rotation(&session, &registry, at(100), true),
            RotationDecision::Hold
        );
        session.current_visible_index = 1;
        assert_eq!(
            evaluate_rotation(&session, &registry, at(100), false),
            RotationDecision::Hold
        );
    }

    #[test]
    fn holds_during_extension() {
        let registry = registry(&[30, 30]);
        let mut session = RuntimeSession::new(at(0));
        session.set_extension(at(0), Duration::minutes(15));
        assert_eq!(
            evaluate_rotation(&session, &registry, at(60), false),
            RotationDecision::Hold
        );
    }

    #[test]
    fn restarts_when_no_other_site_rotates() {
        let registry = registry(&[60, 0, -1]);
        let session = RuntimeSession::new(at(0));
        assert_eq!(
            evaluate_rotation(&session, &registry, at(60), false),
            RotationDecision::Restart
        );
    }

    #[test]
    fn single_visible_site_never_rotates() {
        let registry = registry(&[10, -1]);
        let session = RuntimeSession::new(at(0));
        assert_eq!(
            evaluate_rotation(&session, &registry, at(60), false),
            RotationDecision::Hold
        );
    }

    #[test]
    fn home_return_only_from_manual_or_hidden_pages() {
        let registry = registry(&[30, 0, 20, -1]);
        let home = registry.view_for_tab(0);
        let timeout = Duration::seconds(120);
        let mut session = RuntimeSession::new(at(0));

        // On home.
        assert!(!home_return_due(&session, &registry, home, timeout, at(500), false));

        // On a rotating page.
        session.current_visible_index = 2;
        assert!(!home_return_due(&session, &registry, home, timeout, at(500), false));

        // On a manual page.
        session.current_visible_index = 1;
        assert!(!home_return_due(&session, &registry, home, timeout, at(119), false));
        assert!(home_return_due(&session, &registry, home, timeout, at(120), false));
        assert!(!home_return_due(&session, &registry, home, timeout, at(120), true));
        assert!(!home_return_due(&session, &registry, None, timeout, at(120), false));

        // On a hidden page.
        session.current_visible_index = 2;
        session.showing_hidden = true;
        session.current_hidden_index = Some(0);
        assert!(home_return_due(&session, &registry, home, timeout, at(120), false));
    }
}
