//! KioskEngine - the session controller facade.
//!
//! The engine owns the [`RuntimeSession`] and every component around it. It
//! is driven from a single thread by three inputs:
//!
//! - [`KioskEngine::tick`] once per second (the rotation engine),
//! - [`KioskEngine::poll_media`] every three seconds,
//! - [`KioskEngine::handle_event`] for each inbound host event.
//!
//! Each call returns the [`HostCommand`]s the host must apply, in order.
//! Nothing here blocks or spawns; callers serialize access.

use crate::config::KioskConfig;
use crate::dialogs::{DialogCoordinator, ExtensionChoice};
use crate::keyboard::{CloseReason, KeyboardController};
use crate::lockout::{LockReason, LockoutPolicy};
use crate::media::MediaProbe;
use crate::pin::{validate_pin_input, PinRequirement, PinStore};
use crate::rotation::{evaluate_rotation, home_return_due, RotationDecision};
use crate::sentinel::SentinelFiles;
use crate::session::RuntimeSession;
use crate::sites::{SiteRegistry, ViewSlot};
use crate::Timestamp;
use chrono::Duration;
use kiosk_protocol::{
    DialogKind, HostCommand, HostEvent, InactivityChoice, PinRejection, PowerAction,
    SessionSnapshot,
};

/// Inactivity timeouts beyond a day are clamped.
const MAX_INACTIVITY_TIMEOUT_SECS: u64 = 24 * 3600;

pub struct KioskEngine {
    registry: SiteRegistry,
    home: Option<ViewSlot>,
    inactivity_timeout: Duration,
    lockout: LockoutPolicy,
    session: RuntimeSession,
    dialogs: DialogCoordinator,
    keyboard: KeyboardController,
    probe: Box<dyn MediaProbe>,
    pins: PinStore,
    sentinels: SentinelFiles,
    attached: Option<ViewSlot>,
}

impl KioskEngine {
    pub fn new(
        config: &KioskConfig,
        pins: PinStore,
        sentinels: SentinelFiles,
        probe: Box<dyn MediaProbe>,
        now: Timestamp,
    ) -> Self {
        let registry = SiteRegistry::load(&config.tabs);
        let home = config
            .home_tab()
            .and_then(|tab_index| registry.view_for_tab(tab_index));
        let timeout_secs = config
            .inactivity_timeout_seconds
            .min(MAX_INACTIVITY_TIMEOUT_SECS);

        Self {
            registry,
            home,
            inactivity_timeout: Duration::seconds(timeout_secs as i64),
            lockout: LockoutPolicy::from_config(config),
            session: RuntimeSession::new(now),
            dialogs: DialogCoordinator::default(),
            keyboard: KeyboardController::default(),
            probe,
            pins,
            sentinels,
            attached: None,
        }
    }

    pub fn session(&self) -> &RuntimeSession {
        &self.session
    }

    pub fn registry(&self) -> &SiteRegistry {
        &self.registry
    }

    pub fn is_locked(&self) -> bool {
        self.session.is_locked_out
    }

    pub fn open_dialog(&self) -> Option<DialogKind> {
        self.dialogs.active_kind()
    }

    pub fn keyboard_open(&self) -> bool {
        self.keyboard.is_open()
    }

    pub fn media_probe_name(&self) -> &'static str {
        self.probe.name()
    }

    /// Shows the first view and applies the boot lock policy.
    pub fn start(&mut self, now: Timestamp) -> Vec<HostCommand> {
        let mut commands = Vec::new();

        if let Some(ViewSlot::Visible(index)) = self.home {
            self.session.current_visible_index = index;
        }
        self.session.site_start_time = now;
        commands.extend(self.attach(ViewSlot::Visible(self.session.current_visible_index)));

        // The marker is consumed either way so a stale one cannot fire later.
        let boot_marker = self.sentinels.consume_boot_marker();
        if boot_marker && self.lockout.boot_lock_required() {
            commands.extend(self.lock(LockReason::Boot));
        }

        tracing::info!(
            visible = self.registry.visible().len(),
            hidden = self.registry.hidden().len(),
            home = ?self.home,
            lockout_enabled = self.lockout.enabled(),
            media_probe = self.probe.name(),
            locked = self.session.is_locked_out,
            "Kiosk session started"
        );
        commands
    }

    // ─────────────────────────────────────────────────────────────────────
    // Master tick
    // ─────────────────────────────────────────────────────────────────────

    /// One pass of the ordered decision sequence. The first step that acts
    /// ends the pass.
    pub fn tick(&mut self, now: Timestamp) -> Vec<HostCommand> {
        // 1. Keyboard idle close.
        if self.keyboard.should_auto_close(now) {
            return self.keyboard.close(CloseReason::Auto);
        }

        // 2. Lockout gate and timers.
        if self.session.is_locked_out {
            return Vec::new();
        }
        if self.session.expire_extension(now) {
            tracing::info!("Inactivity extension expired");
        }
        if let Some(reason) = self.lockout.check(&mut self.session, now) {
            return self.lock(reason);
        }

        // 3. Display-wake marker.
        if self.lockout.enabled() && self.sentinels.consume_wake_marker() {
            return self.lock(LockReason::DisplayWake);
        }

        if self.dialogs.prompt_expired(now) {
            tracing::info!("Inactivity prompt timed out; returning home");
            let mut commands = self.dialogs.close(DialogKind::InactivityPrompt);
            commands.extend(self.go_home(now));
            return commands;
        }

        // 4. Media gate.
        if self.session.activity.media_gate_active(now) {
            return Vec::new();
        }

        // 5. Recent-activity gate.
        if self.session.activity.is_user_recently_active(now) {
            return Vec::new();
        }

        // 6. Rotation.
        let dialog_open = self.dialogs.is_open();
        match evaluate_rotation(&self.session, &self.registry, now, dialog_open) {
            RotationDecision::Advance { to } => return self.rotate_to(to, now),
            RotationDecision::Restart => {
                tracing::debug!(
                    index = self.session.current_visible_index,
                    "No other rotating site; restarting site timer"
                );
                self.session.site_start_time = now;
                return Vec::new();
            }
            RotationDecision::Hold => {}
        }

        // 7. Home return, always through the prompt.
        if home_return_due(
            &self.session,
            &self.registry,
            self.home,
            self.inactivity_timeout,
            now,
            dialog_open,
        ) {
            tracing::info!(
                idle_secs = self.session.activity.idle_duration(now).num_seconds(),
                "Inactivity timeout away from home; prompting"
            );
            return self.dialogs.open_inactivity_prompt(now);
        }

        Vec::new()
    }

    /// Consults the media probe; runs on its own cadence.
    pub fn poll_media(&mut self, now: Timestamp) {
        let playing = self.probe.is_playing(now);
        if self.session.activity.mark_media_playing(now, playing) {
            tracing::info!(playing, probe = self.probe.name(), "Media state changed");
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Host events
    // ─────────────────────────────────────────────────────────────────────

    pub fn handle_event(&mut self, event: HostEvent, now: Timestamp) -> Vec<HostCommand> {
        match event {
            HostEvent::UserInput { .. } => self.mark_user_activity(now),
            HostEvent::Navigation {
                user_initiated,
                url,
            } => {
                tracing::debug!(user_initiated, url = ?url, "View navigated");
                if user_initiated {
                    self.mark_user_activity(now)
                } else {
                    Vec::new()
                }
            }
            HostEvent::NextSite => self.navigate_manually(now, true),
            HostEvent::PreviousSite => self.navigate_manually(now, false),
            HostEvent::GoHome => {
                if self.session.is_locked_out {
                    return Vec::new();
                }
                let mut commands = self.mark_user_activity(now);
                commands.extend(self.go_home(now));
                commands
            }
            HostEvent::MediaReport { report } => {
                self.probe.observe_report(now, &report);
                Vec::new()
            }
            HostEvent::MediaState { playing } => {
                self.probe.observe_state(now, playing);
                Vec::new()
            }
            HostEvent::ToggleHidden => self.toggle_hidden(now),
            HostEvent::PinSubmitted { pin } => self.submit_pin(&pin, now),
            HostEvent::PinCancelled => self.dialogs.close(DialogKind::PinEntry),
            HostEvent::PasswordSubmitted { password } => self.submit_password(&password, now),
            HostEvent::InactivityResponse { response } => {
                self.respond_to_inactivity_prompt(response, now)
            }
            HostEvent::OpenPauseDialog => {
                if self.session.is_locked_out {
                    return Vec::new();
                }
                self.dialogs.open_pause()
            }
            HostEvent::PauseResponse { minutes } => self.respond_to_pause(minutes, now),
            HostEvent::ShowKeyboard => {
                let mut commands = self.mark_user_activity(now);
                commands.extend(self.keyboard.show(now));
                commands
            }
            HostEvent::KeyPressed { key } => {
                let mut commands = self.mark_user_activity(now);
                commands.extend(self.keyboard.register_keystroke(now, &key));
                commands
            }
            HostEvent::CloseKeyboard => self.keyboard.close(CloseReason::Manual),
            HostEvent::OpenPowerMenu => vec![HostCommand::ShowPowerMenu {
                actions: self.power_actions(),
            }],
            HostEvent::PowerRequested { action } => self.request_power(action),
            HostEvent::WindowResized { width, height } => {
                tracing::debug!(width, height, "Host window resized");
                match self.attached {
                    Some(slot) => self.attach(slot),
                    None => Vec::new(),
                }
            }
            HostEvent::WindowFocused => {
                tracing::debug!("Host window focused");
                Vec::new()
            }
        }
    }

    /// Records user presence. An open inactivity prompt counts as answered
    /// "I'm here".
    pub fn mark_user_activity(&mut self, now: Timestamp) -> Vec<HostCommand> {
        self.session.mark_user_activity(now);
        if self.dialogs.is_kind_open(DialogKind::InactivityPrompt) {
            self.session.site_start_time = now;
            return self.dialogs.close(DialogKind::InactivityPrompt);
        }
        Vec::new()
    }

    fn navigate_manually(&mut self, now: Timestamp, forward: bool) -> Vec<HostCommand> {
        if self.session.is_locked_out || self.session.showing_hidden {
            return Vec::new();
        }
        let current = self.session.current_visible_index;
        let next = if forward {
            self.registry.next_visible(current)
        } else {
            self.registry.previous_visible(current)
        };
        let Some(next) = next else {
            return Vec::new();
        };

        let mut commands = self.mark_user_activity(now);
        self.session.current_visible_index = next;
        self.session.site_start_time = now;
        self.session.manual_navigation_mode = true;
        tracing::debug!(from = current, to = next, "Manual site switch");
        commands.extend(self.attach(ViewSlot::Visible(next)));
        commands
    }

    fn rotate_to(&mut self, to: usize, now: Timestamp) -> Vec<HostCommand> {
        tracing::info!(
            from = self.session.current_visible_index,
            to,
            "Rotating to next site"
        );
        self.session.current_visible_index = to;
        self.session.site_start_time = now;
        self.session.clear_extension();
        self.attach(ViewSlot::Visible(to))
    }

    fn go_home(&mut self, now: Timestamp) -> Vec<HostCommand> {
        if self.session.is_locked_out {
            return Vec::new();
        }
        match self.home {
            Some(ViewSlot::Visible(index)) => {
                self.session.showing_hidden = false;
                self.session.current_hidden_index = None;
                self.session.current_visible_index = index;
            }
            Some(ViewSlot::Hidden(index)) => {
                self.session.showing_hidden = true;
                self.session.current_hidden_index = Some(index);
            }
            None => {
                self.session.showing_hidden = false;
                self.session.current_hidden_index = None;
            }
        }
        self.session.site_start_time = now;
        self.session.manual_navigation_mode = false;
        self.session.clear_extension();
        tracing::info!(home = ?self.home, "Returned home");
        self.attach(self.session.active_slot())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Dialog responses
    // ─────────────────────────────────────────────────────────────────────

    fn respond_to_inactivity_prompt(
        &mut self,
        response: InactivityChoice,
        now: Timestamp,
    ) -> Vec<HostCommand> {
        if !self.dialogs.is_kind_open(DialogKind::InactivityPrompt) {
            tracing::debug!("Inactivity response without an open prompt; ignored");
            return Vec::new();
        }

        match response {
            InactivityChoice::Present => self.mark_user_activity(now),
            InactivityChoice::Extend { minutes } => {
                let Some(choice) = parse_extension(minutes) else {
                    return Vec::new();
                };
                let commands = self.dialogs.close(DialogKind::InactivityPrompt);
                self.session.mark_user_activity(now);
                self.extend(choice, now);
                commands
            }
            InactivityChoice::ReturnHome => {
                let mut commands = self.dialogs.close(DialogKind::InactivityPrompt);
                self.session.mark_user_activity(now);
                commands.extend(self.go_home(now));
                commands
            }
        }
    }

    fn respond_to_pause(&mut self, minutes: Option<u32>, now: Timestamp) -> Vec<HostCommand> {
        if !self.dialogs.is_kind_open(DialogKind::Pause) {
            tracing::debug!("Pause response without an open pause dialog; ignored");
            return Vec::new();
        }
        let Some(minutes) = minutes else {
            return self.dialogs.close(DialogKind::Pause);
        };
        let Some(choice) = parse_extension(minutes) else {
            return Vec::new();
        };
        let commands = self.dialogs.close(DialogKind::Pause);
        self.session.mark_user_activity(now);
        self.extend(choice, now);
        commands
    }

    fn extend(&mut self, choice: ExtensionChoice, now: Timestamp) {
        let until = self.session.set_extension(now, choice.duration());
        tracing::info!(
            minutes = choice.minutes(),
            until = %until.to_rfc3339(),
            "Inactivity extension granted"
        );
    }

    // ─────────────────────────────────────────────────────────────────────
    // Hidden-site gate
    // ─────────────────────────────────────────────────────────────────────

    pub fn toggle_hidden(&mut self, now: Timestamp) -> Vec<HostCommand> {
        if self.session.is_locked_out {
            tracing::debug!("Hidden toggle ignored while locked");
            return Vec::new();
        }
        if self.registry.hidden().is_empty() {
            tracing::debug!("Hidden toggle ignored; no hidden sites configured");
            return Vec::new();
        }

        let mut commands = self.mark_user_activity(now);

        if self.session.showing_hidden {
            let next = self.session.current_hidden_index.map_or(0, |index| index + 1);
            if next < self.registry.hidden().len() {
                self.session.current_hidden_index = Some(next);
                self.session.site_start_time = now;
                commands.extend(self.attach(ViewSlot::Hidden(next)));
            } else {
                commands.extend(self.leave_hidden(now));
            }
            return commands;
        }

        match self.pins.requirement() {
            PinRequirement::Disabled => commands.extend(self.enter_hidden(now)),
            PinRequirement::Required(_) => commands.extend(self.dialogs.open_pin_entry()),
            PinRequirement::Unavailable => {
                tracing::warn!("Hidden sites requested but no usable PIN is configured");
                commands.push(HostCommand::PinRejected {
                    reason: PinRejection::Unavailable,
                });
            }
        }
        commands
    }

    fn submit_pin(&mut self, pin: &str, now: Timestamp) -> Vec<HostCommand> {
        if self.session.is_locked_out || !self.dialogs.is_kind_open(DialogKind::PinEntry) {
            tracing::debug!("PIN submitted without an open PIN dialog; ignored");
            return Vec::new();
        }
        if validate_pin_input(pin).is_err() {
            return vec![HostCommand::PinRejected {
                reason: PinRejection::InvalidFormat,
            }];
        }

        match self.pins.requirement() {
            PinRequirement::Required(stored) if stored != pin => {
                tracing::warn!("Incorrect hidden-site PIN");
                vec![HostCommand::PinRejected {
                    reason: PinRejection::Incorrect,
                }]
            }
            PinRequirement::Required(_) | PinRequirement::Disabled => {
                let mut commands = self.dialogs.close(DialogKind::PinEntry);
                commands.extend(self.mark_user_activity(now));
                commands.extend(self.enter_hidden(now));
                commands
            }
            PinRequirement::Unavailable => {
                let mut commands = self.dialogs.close(DialogKind::PinEntry);
                commands.push(HostCommand::PinRejected {
                    reason: PinRejection::Unavailable,
                });
                commands
            }
        }
    }

    fn enter_hidden(&mut self, now: Timestamp) -> Vec<HostCommand> {
        self.session.showing_hidden = true;
        self.session.current_hidden_index = Some(0);
        self.session.site_start_time = now;
        tracing::info!("Entered hidden sites");
        self.attach(ViewSlot::Hidden(0))
    }

    fn leave_hidden(&mut self, now: Timestamp) -> Vec<HostCommand> {
        self.session.showing_hidden = false;
        self.session.current_hidden_index = None;
        self.session.site_start_time = now;
        tracing::info!(
            index = self.session.current_visible_index,
            "Left hidden sites; resuming rotation"
        );
        self.attach(ViewSlot::Visible(self.session.current_visible_index))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lockout
    // ─────────────────────────────────────────────────────────────────────

    fn lock(&mut self, reason: LockReason) -> Vec<HostCommand> {
        self.session.is_locked_out = true;
        self.session.restore_after_unlock = Some(self.session.active_slot());
        self.attached = None;
        self.probe.reset();

        let mut commands = vec![HostCommand::DetachAllViews];
        commands.extend(self.dialogs.open_lockout());
        tracing::info!(reason = reason.as_str(), "Kiosk locked");
        commands
    }

    pub fn submit_password(&mut self, password: &str, now: Timestamp) -> Vec<HostCommand> {
        if !self.session.is_locked_out {
            tracing::debug!("Password submitted while unlocked; ignored");
            return Vec::new();
        }
        if !self.lockout.verify(password) {
            tracing::warn!("Incorrect unlock password");
            return vec![HostCommand::PasswordRejected];
        }

        self.session.is_locked_out = false;
        self.session.mark_user_activity(now);
        self.session.site_start_time = now;

        let mut commands = self.dialogs.release_lockout();
        let restore = self
            .session
            .restore_after_unlock
            .take()
            .filter(|slot| self.registry.get(*slot).is_some());
        let slot = match restore {
            Some(slot) => slot,
            None => {
                tracing::warn!("View to restore after unlock is gone; falling back to first site");
                self.session.showing_hidden = false;
                self.session.current_hidden_index = None;
                self.session.current_visible_index = 0;
                ViewSlot::Visible(0)
            }
        };
        tracing::info!(view = ?slot, "Kiosk unlocked");
        commands.extend(self.attach(slot));
        commands
    }

    // ─────────────────────────────────────────────────────────────────────
    // Power menu
    // ─────────────────────────────────────────────────────────────────────

    pub fn power_actions(&self) -> Vec<PowerAction> {
        if self.session.is_locked_out {
            vec![PowerAction::Shutdown, PowerAction::Restart]
        } else {
            vec![PowerAction::Shutdown, PowerAction::Restart, PowerAction::Reload]
        }
    }

    fn request_power(&mut self, action: PowerAction) -> Vec<HostCommand> {
        if !self.power_actions().contains(&action) {
            tracing::warn!(action = action.as_str(), "Power action not allowed while locked");
            return Vec::new();
        }
        tracing::info!(action = action.as_str(), "Power action requested");
        vec![HostCommand::Power { action }]
    }

    // ─────────────────────────────────────────────────────────────────────
    // Views
    // ─────────────────────────────────────────────────────────────────────

    fn attach(&mut self, slot: ViewSlot) -> Vec<HostCommand> {
        self.probe.reset();
        match self.registry.target(slot) {
            Some(view) => {
                self.attached = Some(slot);
                vec![HostCommand::AttachView { view }]
            }
            None => {
                self.attached = None;
                vec![HostCommand::ShowPlaceholder]
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let active_view = self
            .attached
            .and_then(|slot| self.registry.display_target(slot));
        SessionSnapshot {
            locked: self.session.is_locked_out,
            showing_hidden: self.session.showing_hidden,
            current_visible_index: self.session.current_visible_index,
            current_hidden_index: self.session.current_hidden_index,
            visible_sites: self.registry.visible().len(),
            hidden_sites: self.registry.hidden().len(),
            active_view,
            open_dialog: self.dialogs.active_kind(),
            keyboard_open: self.keyboard.is_open(),
            media_playing: self.session.activity.media_playing(),
            manual_navigation_mode: self.session.manual_navigation_mode,
            last_user_interaction: self.session.activity.last_user_interaction().to_rfc3339(),
            site_started_at: self.session.site_start_time.to_rfc3339(),
            inactivity_extension_until: self
                .session
                .inactivity_extension_until
                .map(|until| until.to_rfc3339()),
        }
    }
}

fn parse_extension(minutes: u32) -> Option<ExtensionChoice> {
    match ExtensionChoice::from_minutes(minutes) {
        Ok(choice) => Some(choice),
        Err(err) => {
            tracing::warn!(error = %err, "Rejected extension request");
            None
        }
    }
}
