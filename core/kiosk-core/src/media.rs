//! Media playback detection.
//!
//! The rotation engine only asks [`MediaProbe::is_playing`]. How that answer
//! is produced depends on the host:
//!
//! - [`DomHeuristicProbe`]: the host runs an inspection script in the active
//!   view and reports `<video>`/`<audio>` state plus recognized embeds.
//! - [`ExplicitMediaProbe`]: the host reports playing/stopped directly.
//! - [`NoMediaProbe`]: media never blocks rotation.
//!
//! False negatives are acceptable; false positives are not, since they stall
//! rotation. Every ambiguous signal therefore reads as "not playing".

use crate::Timestamp;
use chrono::Duration;
use kiosk_protocol::{MediaElementKind, MediaElementReport, MediaReport};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// Reports older than this are ignored; a host that stops reporting must not
/// keep rotation paused.
pub const MEDIA_REPORT_MAX_AGE_SECS: i64 = 10;

/// Minimum `readyState` (HAVE_CURRENT_DATA) for an element to count as playing.
const MIN_READY_STATE: u8 = 2;

static RE_EMBEDDED_PLAYER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^https?://(www\.)?(youtube\.com/embed/|youtube-nocookie\.com/embed/|player\.vimeo\.com/video/|player\.twitch\.tv/|w\.soundcloud\.com/player/|open\.spotify\.com/embed/)",
    )
    .unwrap()
});

pub trait MediaProbe: Send {
    fn is_playing(&self, now: Timestamp) -> bool;

    /// Feeds a host inspection report. Probes that do not inspect documents ignore it.
    fn observe_report(&mut self, _now: Timestamp, _report: &MediaReport) {}

    /// Feeds an explicit playing/stopped signal.
    fn observe_state(&mut self, _now: Timestamp, _playing: bool) {}

    /// Forgets what was observed; called whenever the active view changes.
    fn reset(&mut self) {}

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaProbeKind {
    #[default]
    DomHeuristic,
    Explicit,
    None,
}

pub fn build_probe(kind: MediaProbeKind) -> Box<dyn MediaProbe> {
    match kind {
        MediaProbeKind::DomHeuristic => Box::new(DomHeuristicProbe::default()),
        MediaProbeKind::Explicit => Box::<ExplicitMediaProbe>::default(),
        MediaProbeKind::None => Box::new(NoMediaProbe),
    }
}

#[derive(Debug, Default)]
pub struct DomHeuristicProbe {
    last_report: Option<(Timestamp, bool)>,
}

impl MediaProbe for DomHeuristicProbe {
    fn is_playing(&self, now: Timestamp) -> bool {
        match self.last_report {
            Some((received, playing)) => {
                playing
                    && now.signed_duration_since(received)
                        <= Duration::seconds(MEDIA_REPORT_MAX_AGE_SECS)
            }
            None => false,
        }
    }

    fn observe_report(&mut self, now: Timestamp, report: &MediaReport) {
        if let Some(error) = report.script_error.as_deref() {
            tracing::debug!(error, "Media inspection script failed; treating as silent");
        }
        self.last_report = Some((now, report_indicates_playback(report)));
    }

    fn reset(&mut self) {
        self.last_report = None;
    }

    fn name(&self) -> &'static str {
        "dom_heuristic"
    }
}

#[derive(Debug, Default)]
pub struct ExplicitMediaProbe {
    playing: bool,
}

impl MediaProbe for ExplicitMediaProbe {
    fn is_playing(&self, _now: Timestamp) -> bool {
        self.playing
    }

    fn observe_state(&mut self, _now: Timestamp, playing: bool) {
        self.playing = playing;
    }

    fn reset(&mut self) {
        self.playing = false;
    }

    fn name(&self) -> &'static str {
        "explicit"
    }
}

#[derive(Debug, Default)]
pub struct NoMediaProbe;

impl MediaProbe for NoMediaProbe {
    fn is_playing(&self, _now: Timestamp) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

pub fn report_indicates_playback(report: &MediaReport) -> bool {
    if report.script_error.is_some() {
        return false;
    }
    report.elements.iter().any(element_is_playing)
}

fn element_is_playing(element: &MediaElementReport) -> bool {
    match element.kind {
        Some(MediaElementKind::Video) | Some(MediaElementKind::Audio) => {
            element.paused == Some(false)
                && element.ended != Some(true)
                && element.ready_state.unwrap_or(0) >= MIN_READY_STATE
                && element.current_time.map(|t| t > 0.0).unwrap_or(false)
        }
        Some(MediaElementKind::Iframe) | Some(MediaElementKind::Embed) => {
            let recognized = element
                .src
                .as_deref()
                .map(|src| RE_EMBEDDED_PLAYER.is_match(src))
                .unwrap_or(false);
            recognized
                && element
                    .player_state
                    .as_deref()
                    .map(|state| state.eq_ignore_ascii_case("playing"))
                    .unwrap_or(false)
        }
        None => false,
    }
}
